use grimoire::model::{Content, Fields, RecordId};
use grimoire::playlist::DEFAULT_BASENAME;
use grimoire::records::{AssumeYes, PathParser, RemoveScope};
use grimoire::store::MemoryStore;
use grimoire::{AppContext, GrimoireConfig, GrimoireError, PlaylistManager};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const DATABASE: &str = "grimoire";

/// A store holding four records with titles and years
fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::in_memory();
    for (id, title, year) in [
        (10, "Necronomicon", 1927),
        (22, "Key of Solomon", 1500),
        (7, "Book of Shadows", 1949),
        (31, "Picatrix", 1256),
    ] {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!(title));
        fields.insert("year".to_string(), json!(year));
        store.insert_with_id(DATABASE, RecordId(id), fields);
    }
    store
}

fn config(dir: &TempDir) -> GrimoireConfig {
    GrimoireConfig::new(dir.path().join("playlists"), dir.path().join("store.json"))
        .with_database(DATABASE)
}

fn session(dir: &TempDir, store: MemoryStore) -> AppContext {
    AppContext::with_store(config(dir), store).unwrap()
}

/// Save a playlist with the given content and return its basename
fn saved_playlist(ctx: &mut AppContext, name: &str, content: Content) -> String {
    let playlist = ctx.playlists.create(name, "1");
    playlist.set_content(content);
    playlist.save().unwrap();
    playlist.basename().to_string()
}

fn view_ids(ctx: &mut AppContext, basename: &str) -> Vec<u64> {
    ctx.view(basename)
        .unwrap()
        .table()
        .ids()
        .iter()
        .map(|id| id.0)
        .collect()
}

#[test]
fn test_fresh_directory_has_default_playlist() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());

    assert!(ctx.playlists.contains(DEFAULT_BASENAME));
    assert_eq!(ctx.playlists.current_basename(), DEFAULT_BASENAME);

    let view = ctx.current_view().unwrap();
    assert!(view.table().is_empty());
    assert_eq!(view.database(), DATABASE);
}

#[test]
fn test_id_playlist_materializes_in_file_order() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let basename = saved_playlist(
        &mut ctx,
        "Grimoires",
        Content::Ids(vec![RecordId(22), RecordId(99), RecordId(10)]),
    );

    // 99 does not exist and is skipped
    assert_eq!(view_ids(&mut ctx, &basename), vec![22, 10]);

    let view = ctx.view(&basename).unwrap();
    assert_eq!(view.table().cell(0, "title"), Some(&json!("Key of Solomon")));
    assert_eq!(view.table().cell(0, "_db"), Some(&json!(DATABASE)));
}

#[test]
fn test_query_playlist_materializes() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let basename = saved_playlist(
        &mut ctx,
        "Modern",
        Content::Query("MATCH (n) WHERE n.year > 1900 RETURN n ORDER BY n.year".to_string()),
    );

    assert_eq!(view_ids(&mut ctx, &basename), vec![10, 7]);
}

#[test]
fn test_move_rows_persists_id_list() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let ids = [10, 22, 7, 31].map(RecordId).to_vec();
    let basename = saved_playlist(&mut ctx, "Shelf", Content::Ids(ids));

    let mut view = ctx.view(&basename).unwrap();
    let order = view
        .move_rows(&mut ctx.playlists, &[RecordId(31), RecordId(22)], 0)
        .unwrap();
    assert_eq!(order, [22, 31, 10, 7].map(RecordId).to_vec());

    let text = fs::read_to_string(dir.path().join("playlists").join(&basename)).unwrap();
    assert_eq!(text.lines().last(), Some("22 31 10 7"));

    // A new session reads the new order back
    let mut reopened = session(&dir, seeded_store());
    assert_eq!(view_ids(&mut reopened, &basename), vec![22, 31, 10, 7]);
}

#[test]
fn test_move_rows_rejects_bad_requests() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let ids = [10, 22, 7].map(RecordId).to_vec();
    let basename = saved_playlist(&mut ctx, "Shelf", Content::Ids(ids));
    let mut view = ctx.view(&basename).unwrap();

    let everything = vec![RecordId(7), RecordId(10), RecordId(22)];
    for moved in [
        vec![],
        vec![RecordId(10), RecordId(10)],
        vec![RecordId(42)],
        everything,
    ] {
        let result = view.move_rows(&mut ctx.playlists, &moved, 0);
        assert!(matches!(result, Err(GrimoireError::InvalidReorderRequest(_))));
    }
    assert_eq!(
        view.table().ids().iter().map(|id| id.0).collect::<Vec<_>>(),
        vec![10, 22, 7]
    );
}

#[test]
fn test_query_playlist_refuses_reorder() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let query = "MATCH (n) RETURN n".to_string();
    let basename = saved_playlist(&mut ctx, "Everything", Content::Query(query.clone()));

    let mut view = ctx.view(&basename).unwrap();
    let before = view.table().ids();
    let result = view.move_rows(&mut ctx.playlists, &[RecordId(31)], 0);

    assert!(matches!(result, Err(GrimoireError::ReorderConflict(_))));
    assert_eq!(view.table().ids(), before);
    let playlist = ctx.playlists.require_mut(&basename).unwrap();
    assert_eq!(playlist.load_content().unwrap(), &Content::Query(query));
}

#[test]
fn test_version_mismatch_is_reported() {
    let dir = TempDir::new().unwrap();
    let playlist_dir = dir.path().join("playlists");
    fs::create_dir_all(&playlist_dir).unwrap();
    fs::write(
        playlist_dir.join("ancient"),
        "grimoire-playlist 0\nAncient\n5\ngrimoire\n10 22\n",
    )
    .unwrap();

    let mut ctx = session(&dir, seeded_store());
    assert!(ctx.playlists.contains("ancient"));

    let result = ctx.view("ancient");
    assert!(matches!(result, Err(GrimoireError::VersionMismatch { .. })));
}

#[test]
fn test_default_survives_deleting_everything() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let a = saved_playlist(&mut ctx, "A", Content::Empty);
    let b = saved_playlist(&mut ctx, "B", Content::Empty);
    ctx.playlists.ensure_default().save().unwrap();

    let removed = ctx
        .playlists
        .delete(&[a.as_str(), b.as_str(), DEFAULT_BASENAME])
        .unwrap();
    assert_eq!(removed, 3);
    assert_eq!(ctx.playlists.len(), 1);
    assert!(ctx.playlists.contains(DEFAULT_BASENAME));
    assert!(!dir.path().join("playlists").join(&a).exists());

    ctx.playlists.rescan().unwrap();
    assert!(ctx.playlists.contains(DEFAULT_BASENAME));
}

#[test]
fn test_offline_store_yields_empty_view() {
    let dir = TempDir::new().unwrap();
    let mut store = seeded_store();
    store.set_online(false);
    let mut ctx = session(&dir, store);
    let basename = saved_playlist(&mut ctx, "Shelf", Content::Ids(vec![RecordId(10)]));

    let view = ctx.view(&basename).unwrap();
    assert!(view.table().is_empty());

    // The playlist itself is untouched
    let playlist = ctx.playlists.require_mut(&basename).unwrap();
    assert_eq!(playlist.load_content().unwrap(), &Content::Ids(vec![RecordId(10)]));
}

#[test]
fn test_add_and_remove_keep_playlist_in_step() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("incoming");
    fs::create_dir_all(&files).unwrap();
    let first = files.join("lemegeton.txt");
    let second = files.join("arbatel.txt");
    fs::write(&first, b"goetia").unwrap();
    fs::write(&second, b"magic").unwrap();

    let mut ctx = session(&dir, seeded_store());
    let basename = saved_playlist(&mut ctx, "Shelf", Content::Ids(vec![RecordId(10)]));
    let mut view = ctx.view(&basename).unwrap();

    let outcomes = view
        .add_paths(
            &mut ctx.playlists,
            &mut ctx.connection,
            &[first.clone(), second.clone()],
            &PathParser,
        )
        .unwrap();
    let added = grimoire::records::added_ids(&outcomes);
    assert_eq!(added.len(), 2);
    assert_eq!(view.table().row_count(), 3);
    assert_eq!(view.table().cell(1, "stem"), Some(&json!("lemegeton")));

    let report = view
        .remove(
            &mut ctx.playlists,
            &mut ctx.connection,
            &[RecordId(10), added[0]],
            RemoveScope::View,
            &mut AssumeYes,
        )
        .unwrap();
    assert_eq!(report.removed_ids.len(), 2);
    assert_eq!(view.table().ids(), vec![added[1]]);
    assert!(first.exists());

    let playlist = ctx.playlists.require_mut(&basename).unwrap();
    playlist.reload().unwrap();
    assert_eq!(playlist.load_content().unwrap(), &Content::Ids(vec![added[1]]));
}

#[test]
fn test_declined_destructive_remove_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let ids = [10, 22].map(RecordId).to_vec();
    let basename = saved_playlist(&mut ctx, "Shelf", Content::Ids(ids.clone()));
    let mut view = ctx.view(&basename).unwrap();

    let mut decline = |_: &str| false;
    let report = view
        .remove(
            &mut ctx.playlists,
            &mut ctx.connection,
            &[RecordId(22)],
            RemoveScope::Store,
            &mut decline,
        )
        .unwrap();

    assert!(report.aborted);
    assert_eq!(view.table().ids(), ids);
    assert_eq!(view_ids(&mut ctx, &basename), vec![10, 22]);
}

#[test]
fn test_screen_names_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let basename = saved_playlist(&mut ctx, "Forbidden Texts", Content::Empty);
    ctx.shutdown().unwrap();

    let mut manager = PlaylistManager::from_config(&config(&dir)).unwrap();
    let playlist = manager.require_mut(&basename).unwrap();
    assert_eq!(playlist.screen_name().unwrap(), "Forbidden Texts");
    assert_eq!(playlist.database().unwrap(), DATABASE);
    assert!(!playlist.is_content_loaded());
}

/// Put a directory where the playlist file was, so the next save fails
fn block_playlist_file(dir: &TempDir, basename: &str) {
    let path = dir.path().join("playlists").join(basename);
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();
}

#[test]
fn test_failed_save_leaves_move_undone() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let ids = [10, 22, 7].map(RecordId).to_vec();
    let basename = saved_playlist(&mut ctx, "Shelf", Content::Ids(ids.clone()));
    let mut view = ctx.view(&basename).unwrap();
    block_playlist_file(&dir, &basename);

    let result = view.move_rows(&mut ctx.playlists, &[RecordId(7)], 0);
    assert!(matches!(result, Err(GrimoireError::Io(_))));
    assert_eq!(view.table().ids(), ids);

    let playlist = ctx.playlists.require_mut(&basename).unwrap();
    assert_eq!(playlist.content(), Some(&Content::Ids(ids)));
}

#[test]
fn test_failed_save_still_reports_removal() {
    let dir = TempDir::new().unwrap();
    let mut ctx = session(&dir, seeded_store());
    let ids = [10, 22].map(RecordId).to_vec();
    let basename = saved_playlist(&mut ctx, "Shelf", Content::Ids(ids));
    let mut view = ctx.view(&basename).unwrap();
    block_playlist_file(&dir, &basename);

    let report = view
        .remove(
            &mut ctx.playlists,
            &mut ctx.connection,
            &[RecordId(22)],
            RemoveScope::View,
            &mut AssumeYes,
        )
        .unwrap();
    assert_eq!(report.removed_ids, vec![RecordId(22)]);
    assert!(report.save_failed);
    assert_eq!(view.table().ids(), vec![RecordId(10)]);
}
