use anyhow::Result;

use basaltdb::storage::page::BlockId;

#[path = "../common/mod.rs"]
mod common;
use common::{create_test_db, reopen_db};

#[test]
fn test_committed_change_survives_restart() -> Result<()> {
    let (db, path, _dir) = create_test_db()?;

    let mut tx = db.new_tx()?;
    let blk = tx.append("t.dat")?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 80, 123, true)?;
    tx.commit()?;
    drop(db);

    let db = reopen_db(&path)?;
    let mut tx = db.new_tx()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 80)?, 123);
    tx.commit()?;
    Ok(())
}

#[test]
fn test_uncommitted_change_is_undone_on_restart() -> Result<()> {
    let (db, path, _dir) = create_test_db()?;
    let blk;

    {
        let mut setup = db.new_tx()?;
        blk = setup.append("t.dat")?;
        setup.pin(&blk)?;
        setup.set_int(&blk, 80, 5, true)?;
        setup.set_string(&blk, 120, "keep me", true)?;
        setup.commit()?;

        let mut unfinished = db.new_tx()?;
        unfinished.pin(&blk)?;
        unfinished.set_int(&blk, 80, 9, true)?;
        unfinished.set_string(&blk, 120, "lose me", true)?;
        // neither commit nor rollback: the transaction just stops
        drop(unfinished);
    }
    drop(db);

    let db = reopen_db(&path)?;
    let mut tx = db.new_tx()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 80)?, 5);
    assert_eq!(tx.get_string(&blk, 120)?, "keep me");
    tx.commit()?;
    Ok(())
}

#[test]
fn test_recovery_sorts_finished_from_unfinished() -> Result<()> {
    let (db, path, _dir) = create_test_db()?;
    let blk;

    {
        let mut setup = db.new_tx()?;
        blk = setup.append("t.dat")?;
        setup.pin(&blk)?;
        setup.set_int(&blk, 0, 100, true)?;
        setup.set_int(&blk, 10, 200, true)?;
        setup.commit()?;

        // committed: its change must survive recovery
        let mut committed = db.new_tx()?;
        committed.pin(&blk)?;
        committed.set_int(&blk, 0, 111, true)?;
        committed.commit()?;

        // unfinished: its change must be undone
        let mut unfinished = db.new_tx()?;
        unfinished.pin(&blk)?;
        unfinished.set_int(&blk, 10, 222, true)?;
        drop(unfinished);
    }
    drop(db);

    let db = reopen_db(&path)?;
    let mut tx = db.new_tx()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 0)?, 111);
    assert_eq!(tx.get_int(&blk, 10)?, 200);
    tx.commit()?;
    Ok(())
}

#[test]
fn test_recovery_is_idempotent() -> Result<()> {
    let (db, path, _dir) = create_test_db()?;
    let blk;

    {
        let mut setup = db.new_tx()?;
        blk = setup.append("t.dat")?;
        setup.pin(&blk)?;
        setup.set_int(&blk, 40, 7, true)?;
        setup.commit()?;

        let mut unfinished = db.new_tx()?;
        unfinished.pin(&blk)?;
        unfinished.set_int(&blk, 40, 8, true)?;
        drop(unfinished);
    }
    drop(db);

    // recover twice; the second run finds the checkpoint the first wrote
    // and has nothing to undo
    let db = reopen_db(&path)?;
    drop(db);
    let db = reopen_db(&path)?;

    let mut tx = db.new_tx()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 40)?, 7);
    tx.commit()?;
    Ok(())
}

#[test]
fn test_undone_block_is_addressed_by_file_and_number() -> Result<()> {
    let (db, path, _dir) = create_test_db()?;

    {
        let mut setup = db.new_tx()?;
        let a0 = setup.append("a.dat")?;
        let b0 = setup.append("b.dat")?;
        setup.pin(&a0)?;
        setup.pin(&b0)?;
        setup.set_int(&a0, 0, 1, true)?;
        setup.set_int(&b0, 0, 2, true)?;
        setup.commit()?;

        // touch only b.dat, then vanish
        let mut unfinished = db.new_tx()?;
        unfinished.pin(&b0)?;
        unfinished.set_int(&b0, 0, 99, true)?;
        drop(unfinished);
    }
    drop(db);

    let db = reopen_db(&path)?;
    let mut tx = db.new_tx()?;
    let a0 = BlockId::new("a.dat", 0);
    let b0 = BlockId::new("b.dat", 0);
    tx.pin(&a0)?;
    tx.pin(&b0)?;
    assert_eq!(tx.get_int(&a0, 0)?, 1);
    assert_eq!(tx.get_int(&b0, 0)?, 2);
    tx.commit()?;
    Ok(())
}
