use common::{init_logging, moves, random_games, visits};
use fbtree::{Config, Error, FiberId, FiberTree, Snapshot};
use std::fs;

mod common;

fn sample() -> anyhow::Result<FiberTree> {
    let mut tree = FiberTree::memory();
    for (moves, outcome) in random_games(11, 80, 9, 8) {
        tree.simulate_path(&moves, outcome, 1, true)?;
    }
    Ok(tree)
}

fn assert_same_paths(a: &FiberTree, b: &FiberTree) -> anyhow::Result<()> {
    assert_eq!(a.len()?, b.len()?);
    for stats in a.get_common_path_statistics(0)? {
        let id = b.find_path(&stats.path)?.expect("path survives");
        let other = b.get_statistics(&id)?.expect("stored");
        let this = a.get_statistics(&stats.fiber_id)?.expect("stored");
        assert_eq!(this.visit_count, other.visit_count);
        assert_eq!(this.win_count, other.win_count);
        assert_eq!(this.win_rate, other.win_rate);
    }
    Ok(())
}

#[test]
fn json_round_trip() -> anyhow::Result<()> {
    init_logging();
    let tree = sample()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tree.json");
    tree.export_to_json(&path)?;

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(json["metadata"]["format"], "fbtree");
    assert!(json["fibers"]["root"]["parent_id"].is_null());

    let copy = FiberTree::import_from_json(&path, Config::memory())?;
    assert_same_paths(&tree, &copy)?;
    assert_eq!(copy.get_all_fibers()?, tree.get_all_fibers()?);
    Ok(())
}

#[test]
fn round_trip_into_sqlite() -> anyhow::Result<()> {
    let tree = sample()?;
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("tree.db");
    let copy = FiberTree::from_snapshot(Config::sqlite(&db), tree.export_snapshot()?)?;
    assert_same_paths(&tree, &copy)?;
    copy.close()?;

    let reopened = FiberTree::open(&db)?;
    assert_same_paths(&tree, &reopened)?;
    // export of the copy describes the same tree
    let again = reopened.export_snapshot()?;
    assert_eq!(again.fibers, tree.export_snapshot()?.fibers);
    Ok(())
}

#[test]
fn import_is_order_independent() -> anyhow::Result<()> {
    let json = r#"{
        "metadata": { "source": "hand written" },
        "fibers": {
            "b": { "moves": [{ "value": 3 }], "parent_id": "a",
                   "stats": { "visit_count": 1, "win_count": 1, "loss_count": 0, "draw_count": 0 } },
            "a": { "moves": [{ "value": 1 }, { "value": 2 }], "parent_id": "root",
                   "stats": { "visit_count": 2, "win_count": 1, "loss_count": 1, "draw_count": 0 } },
            "root": { "moves": [], "parent_id": null,
                   "stats": { "visit_count": 2, "win_count": 1, "loss_count": 1, "draw_count": 0 } }
        }
    }"#;
    let snapshot = Snapshot::from_reader(json.as_bytes())?;
    let tree = FiberTree::from_snapshot(Config::memory(), snapshot)?;
    assert_eq!(tree.len()?, 3);
    assert_eq!(tree.find_path(&moves(&[1, 2, 3]))?, Some(FiberId::from("b")));
    assert_eq!(visits(&tree, &moves(&[1]))?, Some(2));
    Ok(())
}

#[test]
fn dangling_parent_rejects_the_whole_file() -> anyhow::Result<()> {
    let json = r#"{
        "metadata": {},
        "fibers": {
            "root": { "moves": [], "parent_id": null,
                   "stats": { "visit_count": 0, "win_count": 0, "loss_count": 0, "draw_count": 0 } },
            "a": { "moves": [{ "value": 1 }], "parent_id": "root",
                   "stats": { "visit_count": 0, "win_count": 0, "loss_count": 0, "draw_count": 0 } },
            "b": { "moves": [{ "value": 2 }], "parent_id": "gone",
                   "stats": { "visit_count": 0, "win_count": 0, "loss_count": 0, "draw_count": 0 } }
        }
    }"#;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.json");
    fs::write(&path, json)?;
    let result = FiberTree::import_from_json(&path, Config::memory());
    assert!(matches!(result, Err(Error::CorruptSnapshot(_))));

    // an existing durable tree is not touched either
    let db = dir.path().join("tree.db");
    let mut tree = FiberTree::open(&db)?;
    tree.simulate_path(&moves(&[4]), fbtree::Outcome::Win, 1, true)?;
    let snapshot = Snapshot::from_reader(json.as_bytes())?;
    assert!(tree.import_snapshot(snapshot).is_err());
    assert_eq!(tree.len()?, 2);
    Ok(())
}

#[test]
fn missing_file_is_io() {
    let result = FiberTree::import_from_json("/nonexistent/tree.json", Config::memory());
    assert!(matches!(result, Err(Error::Io(_))));
}
