//! Namespace operations: listing, directory creation, shortening, moving,
//! and recursive deletion.

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use common::{
    CountingProvider, PASSWORD, add_file, create_test_vault, default_create_options,
    vault_parent_dir, vault_root,
};
use ferrovault_core::fs::name::shorten_name;
use ferrovault_core::provider::DataProvider;
use ferrovault_core::{
    DirId, EncryptedItem, EntryType, ListProgress, OpenOptions, QueryOptions, Vault, VaultError,
};

const LONG_NAME_LEN: usize = 180;

fn long_name() -> String {
    "x".repeat(LONG_NAME_LEN)
}

#[tokio::test]
async fn long_names_are_shortened_and_round_trip() {
    // Seed scenario: a 180-byte name under a 36-byte DirID encodes past the
    // 220 threshold, lands in a .c9s entry, and survives a relisting.
    let (provider, vault) = create_test_vault().await;
    let root = vault.root_dir().unwrap();

    let parent = vault
        .create_directory("parent", &root, Some("e9250eb8-078d-4fc0-8835-be92a313360c"))
        .await
        .unwrap();
    let parent_id = parent.dir_id().await.unwrap();

    let name = long_name();
    let encoded = vault.encrypt_item_name(&name, &parent_id).unwrap();
    assert!(encoded.len() > 220, "encoded length {}", encoded.len());

    let dir = vault.create_directory(&name, &parent, None).await.unwrap();
    assert!(dir.is_shortened());
    assert_eq!(dir.stored_name(), format!("{}.c9s", shorten_name(&encoded)));

    let sidecar = provider
        .read_file_string(&dir.storage_path().join("name.c9s"))
        .await
        .unwrap();
    assert_eq!(sidecar, encoded);

    let listed = vault.list_items(&parent_id, ListProgress::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name(), name);
    assert_eq!(listed[0].entry_type(), EntryType::Directory);
    assert!(listed[0].is_shortened());
}

#[tokio::test]
async fn listing_decrypts_names_and_classifies_types() {
    let (_provider, vault) = create_test_vault().await;
    let root_handle = vault.root_dir().unwrap();
    let root = DirId::root();

    vault.create_directory("projects", &root_handle, None).await.unwrap();
    add_file(&vault, &root, "notes.txt").await;
    add_file(&vault, &root, "unicode-café.doc").await;

    let items = vault.list_items(&root, ListProgress::default()).await.unwrap();
    assert_eq!(items.len(), 3);

    let mut names: Vec<(String, EntryType)> = items
        .iter()
        .map(|i| (i.name().to_string(), i.entry_type()))
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        names,
        vec![
            ("notes.txt".to_string(), EntryType::File),
            ("projects".to_string(), EntryType::Directory),
            ("unicode-café.doc".to_string(), EntryType::File),
        ]
    );
}

#[tokio::test]
async fn listing_preserves_provider_order() {
    let (_provider, vault) = create_test_vault().await;
    let root = DirId::root();

    for name in ["zebra.txt", "apple.txt", "mango.txt", "kiwi.txt"] {
        add_file(&vault, &root, name).await;
    }

    let raw = vault.list_encrypted(&root).await.unwrap();
    let items = vault.list_items(&root, ListProgress::default()).await.unwrap();
    assert_eq!(raw.len(), items.len());
    for (raw_item, item) in raw.iter().zip(&items) {
        assert_eq!(raw_item.full_name, *item.storage_path());
    }
}

#[tokio::test]
async fn listing_reports_per_completion_progress() {
    let (_provider, vault) = create_test_vault().await;
    let root = DirId::root();
    for i in 0..5 {
        add_file(&vault, &root, &format!("file-{i}.txt")).await;
    }

    let name_calls: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
    let type_calls: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
    let on_name = |done: usize, total: usize| name_calls.lock().unwrap().push((done, total));
    let on_type = |done: usize, total: usize| type_calls.lock().unwrap().push((done, total));

    vault
        .list_items(
            &root,
            ListProgress {
                on_name: Some(&on_name),
                on_type: Some(&on_type),
            },
        )
        .await
        .unwrap();

    let name_calls = name_calls.into_inner().unwrap();
    let type_calls = type_calls.into_inner().unwrap();
    assert_eq!(name_calls.len(), 5);
    assert_eq!(type_calls.len(), 5);
    assert!(name_calls.iter().all(|&(done, total)| total == 5 && done >= 1 && done <= 5));
    assert_eq!(name_calls.last().unwrap().0, 5);
    assert_eq!(type_calls.last().unwrap().0, 5);
}

#[tokio::test]
async fn shortened_directory_with_contents_file_is_a_file() {
    let (_provider, vault) = create_test_vault().await;
    let root = DirId::root();

    // add_file fabricates the .c9s directory + contents.c9r layout.
    let entry = add_file(&vault, &root, &long_name()).await;
    assert!(entry.as_str().ends_with(".c9s"));

    let items = vault.list_items(&root, ListProgress::default()).await.unwrap();
    assert_eq!(items.len(), 1);
    match &items[0] {
        EncryptedItem::File(file) => {
            assert!(file.is_shortened());
            assert_eq!(file.name(), long_name());
            assert_eq!(file.contents_path(), entry.join("contents.c9r"));
        }
        EncryptedItem::Dir(_) => panic!("shortened file classified as directory"),
    }
}

#[tokio::test]
async fn created_directory_is_listable_and_id_persists() {
    let (provider, vault) = create_test_vault().await;
    let root_handle = vault.root_dir().unwrap();

    let created = vault.create_directory("docs", &root_handle, None).await.unwrap();
    let created_id = created.dir_id().await.unwrap();
    assert!(!created_id.is_root());

    // The dir.c9r file holds the raw DirID.
    let stored = provider
        .read_file_string(&created.storage_path().join("dir.c9r"))
        .await
        .unwrap();
    assert_eq!(stored, created_id.as_str());

    // A freshly listed handle resolves the same DirID from storage.
    let items = vault.list_items(&DirId::root(), ListProgress::default()).await.unwrap();
    let listed = items.into_iter().find_map(EncryptedItem::into_dir).unwrap();
    assert_eq!(listed.dir_id().await.unwrap(), created_id);

    // The mapped content directory exists.
    assert!(provider.exists(&vault.dir_path(&created_id).unwrap()).await.unwrap());
}

#[tokio::test]
async fn create_directory_rejects_duplicates() {
    let (_provider, vault) = create_test_vault().await;
    let root_handle = vault.root_dir().unwrap();

    vault.create_directory("docs", &root_handle, None).await.unwrap();
    let err = vault.create_directory("docs", &root_handle, None).await.unwrap_err();
    assert!(matches!(err, VaultError::AlreadyExists { .. }), "{err}");
}

#[tokio::test]
async fn empty_fixed_id_reproduces_root_mapping() {
    // Compatibility quirk: an explicitly empty DirID collides with the root.
    let (_provider, vault) = create_test_vault().await;
    let root_handle = vault.root_dir().unwrap();

    let dir = vault.create_directory("alias", &root_handle, Some("")).await.unwrap();
    assert_eq!(dir.dir_id().await.unwrap(), DirId::root());
    assert_eq!(dir.contents_path().await.unwrap(), vault.root_dir_path().unwrap());
}

#[tokio::test]
async fn move_file_between_directories() {
    let (_provider, vault) = create_test_vault().await;
    let root_handle = vault.root_dir().unwrap();

    let dir_a = vault.create_directory("a", &root_handle, None).await.unwrap();
    let dir_b = vault.create_directory("b", &root_handle, None).await.unwrap();
    let a_id = dir_a.dir_id().await.unwrap();
    let b_id = dir_b.dir_id().await.unwrap();

    add_file(&vault, &a_id, "doc.txt").await;
    let items = vault.list_items(&a_id, ListProgress::default()).await.unwrap();
    assert_eq!(items.len(), 1);

    vault.move_items(items, &b_id).await.unwrap();

    assert!(vault.list_items(&a_id, ListProgress::default()).await.unwrap().is_empty());
    let in_b = vault.list_items(&b_id, ListProgress::default()).await.unwrap();
    assert_eq!(in_b.len(), 1);
    assert_eq!(in_b[0].name(), "doc.txt");
    assert_eq!(in_b[0].entry_type(), EntryType::File);
}

#[tokio::test]
async fn rename_directory_across_shortening_threshold() {
    let (provider, vault) = create_test_vault().await;
    let root_handle = vault.root_dir().unwrap();
    let root = DirId::root();

    let dir = vault.create_directory("short", &root_handle, None).await.unwrap();
    let original_id = dir.dir_id().await.unwrap();
    assert!(!dir.is_shortened());

    let new_name = long_name();
    dir.rename(&new_name).await.unwrap();

    let items = vault.list_items(&root, ListProgress::default()).await.unwrap();
    assert_eq!(items.len(), 1);
    let renamed = items.into_iter().find_map(EncryptedItem::into_dir).unwrap();
    assert_eq!(renamed.name(), new_name);
    assert!(renamed.is_shortened());
    // The entry moved but the DirID (and thus the content mapping) survives.
    assert_eq!(renamed.dir_id().await.unwrap(), original_id);
    assert!(
        provider
            .exists(&renamed.storage_path().join("name.c9s"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn rename_shortened_file_back_to_regular() {
    let (provider, vault) = create_test_vault().await;
    let root = DirId::root();

    add_file(&vault, &root, &long_name()).await;
    let items = vault.list_items(&root, ListProgress::default()).await.unwrap();
    let file = items.into_iter().find_map(EncryptedItem::into_file).unwrap();
    assert!(file.is_shortened());

    file.rename("s.txt").await.unwrap();

    let items = vault.list_items(&root, ListProgress::default()).await.unwrap();
    assert_eq!(items.len(), 1);
    let file = items.into_iter().find_map(EncryptedItem::into_file).unwrap();
    assert_eq!(file.name(), "s.txt");
    assert!(!file.is_shortened());
    // The body followed the entry out of the .c9s directory.
    assert_eq!(
        provider.read_file_string(file.storage_path()).await.unwrap(),
        "ciphertext"
    );
}

#[tokio::test]
async fn delete_file_removes_entry() {
    let (provider, vault) = create_test_vault().await;
    let root = DirId::root();

    let regular = add_file(&vault, &root, "short.txt").await;
    let shortened = add_file(&vault, &root, &long_name()).await;

    let items = vault.list_items(&root, ListProgress::default()).await.unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        if let EncryptedItem::File(file) = item {
            vault.delete_file(file).await.unwrap();
        }
    }

    assert!(!provider.exists(&regular).await.unwrap());
    assert!(!provider.exists(&shortened).await.unwrap());
    assert!(vault.list_items(&root, ListProgress::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn recursive_delete_removes_every_discovered_path() {
    // Seed scenario: a 3-level tree with 10 entries per directory.
    let (provider, vault) = create_test_vault().await;
    let root_handle = vault.root_dir().unwrap();

    let level0 = vault.create_directory("level0", &root_handle, None).await.unwrap();
    let level0_id = level0.dir_id().await.unwrap();
    for i in 0..9 {
        add_file(&vault, &level0_id, &format!("l0-file-{i}.dat")).await;
    }
    let level1 = vault.create_directory("level1", &level0, None).await.unwrap();
    let level1_id = level1.dir_id().await.unwrap();
    for i in 0..9 {
        add_file(&vault, &level1_id, &format!("l1-file-{i}.dat")).await;
    }
    let level2 = vault.create_directory("level2", &level1, None).await.unwrap();
    let level2_id = level2.dir_id().await.unwrap();
    for i in 0..10 {
        add_file(&vault, &level2_id, &format!("l2-file-{i}.dat")).await;
    }

    let level0_entry = level0.storage_path().clone();

    let discoveries: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
    let on_discover =
        |discovered: usize, to_discover: usize| discoveries.lock().unwrap().push((discovered, to_discover));

    let removed = vault.delete_dir(&level0, Some(&on_discover)).await.unwrap();
    // level0 entry + 10 + 10 + 10 children.
    assert_eq!(removed, 31);

    let discoveries = discoveries.into_inner().unwrap();
    assert_eq!(discoveries.len(), 3, "one callback per non-empty directory");
    assert_eq!(*discoveries.last().unwrap(), (31, 0), "stack drains before deletion");

    // Every enumerated entry is gone; the mapped directories survive as
    // empty husks, so relisting the DirIDs yields nothing.
    assert!(!provider.exists(&level0_entry).await.unwrap());
    for id in [&level0_id, &level1_id, &level2_id] {
        assert!(vault.list_items(id, ListProgress::default()).await.unwrap().is_empty());
    }
    assert!(vault.list_items(&DirId::root(), ListProgress::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn bounded_concurrency_caps_outstanding_provider_calls() {
    let provider = Arc::new(CountingProvider::new());
    let vault = Vault::create(
        Arc::clone(&provider),
        &vault_parent_dir(),
        PASSWORD,
        default_create_options(),
    )
    .await
    .unwrap();

    // Shortened entries force provider I/O in both listing phases.
    {
        let root_handle = vault.root_dir().unwrap();
        for i in 0..8 {
            let name = format!("{}-{i}", "d".repeat(LONG_NAME_LEN));
            vault.create_directory(&name, &root_handle, None).await.unwrap();
        }
    }
    drop(vault);

    // Unbounded: batch-mates genuinely overlap.
    let unbounded = Vault::open(
        Arc::clone(&provider),
        &vault_root(),
        PASSWORD,
        OpenOptions::new().with_query_options(QueryOptions { concurrency: -1 }),
    )
    .await
    .unwrap();
    provider.reset();
    unbounded
        .list_items(&DirId::root(), ListProgress::default())
        .await
        .unwrap();
    assert!(
        provider.max_concurrent() >= 4,
        "expected unbounded overlap, saw {}",
        provider.max_concurrent()
    );
    drop(unbounded);

    // Bounded: no more than 2 outstanding provider calls at any instant.
    let bounded = Vault::open(
        Arc::clone(&provider),
        &vault_root(),
        PASSWORD,
        OpenOptions::new().with_query_options(QueryOptions { concurrency: 2 }),
    )
    .await
    .unwrap();
    provider.reset();
    bounded
        .list_items(&DirId::root(), ListProgress::default())
        .await
        .unwrap();
    assert!(
        provider.max_concurrent() <= 2,
        "ceiling of 2 exceeded: {}",
        provider.max_concurrent()
    );

    provider.reset();
    let items = bounded
        .list_items(&DirId::root(), ListProgress::default())
        .await
        .unwrap();
    let victim = items.into_iter().find_map(EncryptedItem::into_dir).unwrap();
    bounded.delete_dir(&victim, None).await.unwrap();
    assert!(
        provider.max_concurrent() <= 2,
        "delete ceiling of 2 exceeded: {}",
        provider.max_concurrent()
    );
}
