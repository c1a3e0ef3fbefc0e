//! Integration tests for tree persistence backends
//!
//! Exercises the JSON file store in a temporary directory and the SQLite
//! store both in memory and on disk.

use chrono::{TimeZone, Utc};

use decision_tree_builder::config::DatabaseConfig;
use decision_tree_builder::llm::parse_question;
use decision_tree_builder::storage::{record_name, JsonFileStore, SqliteStore, TreeRecord, TreeStore};
use decision_tree_builder::tree::DecisionTree;

const FLICKER: &str = r#"{"question":"Is the flicker constant or intermittent?","answers":[{"answer_text":"Constant","potential_outcomes":["Hardware fault"]},{"answer_text":"Intermittent","potential_outcomes":["Loose cable","Driver issue"]}]}"#;

const CABLE: &str = r#"{"question":"Does wiggling the cable change it?","answers":[{"answer_text":"Yes","potential_outcomes":["Loose cable"]},{"answer_text":"No","potential_outcomes":["Driver issue"]}]}"#;

fn create_test_tree(query: &str) -> DecisionTree {
    DecisionTree::new(
        "Technical Troubleshooter",
        query,
        "gpt-test",
        &parse_question(FLICKER).unwrap(),
    )
}

fn expand_second_answer(tree: &mut DecisionTree) {
    let answer_id = tree.root().answers[1].clone();
    tree.attach_question(&answer_id, &parse_question(CABLE).unwrap())
        .unwrap();
}

#[test]
fn test_record_name_is_deterministic() {
    let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 1).unwrap();
    let name = record_name(at, "Medical Triage Nurse", "Chest pain, 3 days?");
    assert_eq!(name, "20241231_235901_Medical_Triage_Nurse_Chest_pain__3_days_");
    assert_eq!(name, record_name(at, "Medical Triage Nurse", "Chest pain, 3 days?"));
}

#[cfg(test)]
mod file_store_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("trees"));

        let record = TreeRecord::from_tree(&create_test_tree("Screen flickers"));
        store.save(&record).await.unwrap();

        let path = dir.path().join("trees").join(format!("{}.json", record.name()));
        assert!(path.exists());

        let loaded = store.load(&record.name()).await.unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_save_overwrites_same_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let mut tree = create_test_tree("Screen flickers");
        store.save(&TreeRecord::from_tree(&tree)).await.unwrap();
        expand_second_answer(&mut tree);
        store.save(&TreeRecord::from_tree(&tree)).await.unwrap();

        let names = store.list().await.unwrap();
        assert_eq!(names.len(), 1);

        let loaded = store.load(&names[0]).await.unwrap().unwrap();
        assert!(loaded.tree.answers[1].child.is_some());
    }

    #[tokio::test]
    async fn test_list_missing_dir_and_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent"));

        assert!(store.list().await.unwrap().is_empty());
        assert!(store.load("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join(".partial.json.tmp"), "x").unwrap();

        let record = TreeRecord::from_tree(&create_test_tree("q"));
        store.save(&record).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![record.name()]);
    }
}

#[cfg(test)]
mod sqlite_store_tests {
    use super::*;

    async fn create_test_store() -> SqliteStore {
        SqliteStore::new_in_memory()
            .await
            .expect("Failed to create in-memory store")
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = create_test_store().await;
        let record = TreeRecord::from_tree(&create_test_tree("Screen flickers"));

        store.save(&record).await.unwrap();

        let loaded = store.load(&record.name()).await.unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row() {
        let store = create_test_store().await;
        let mut tree = create_test_tree("Screen flickers");

        store.save(&TreeRecord::from_tree(&tree)).await.unwrap();
        expand_second_answer(&mut tree);
        let latest = TreeRecord::from_tree(&tree);
        store.save(&latest).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tree_records")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);

        let loaded = store.load(&latest.name()).await.unwrap().unwrap();
        assert_eq!(loaded.meta.last_updated, latest.meta.last_updated);
        assert!(loaded.tree.answers[1].child.is_some());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let store = create_test_store().await;
        let b = TreeRecord::from_tree(&create_test_tree("bbb"));
        let a = TreeRecord::from_tree(&create_test_tree("aaa"));
        store.save(&b).await.unwrap();
        store.save(&a).await.unwrap();

        let mut expected = vec![a.name(), b.name()];
        expected.sort();
        assert_eq!(store.list().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_on_disk_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("trees.db"),
            max_connections: 2,
        };

        let record = TreeRecord::from_tree(&create_test_tree("Screen flickers"));
        {
            let store = SqliteStore::new(&config).await.unwrap();
            store.save(&record).await.unwrap();
            store.pool().close().await;
        }

        let reopened = SqliteStore::new(&config).await.unwrap();
        assert_eq!(reopened.list().await.unwrap(), vec![record.name()]);
    }
}
