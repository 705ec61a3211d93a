use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use basaltdb::transaction::recovery::LogRecord;

#[path = "../common/mod.rs"]
mod common;
use common::create_test_db;

#[test]
fn test_checkpoint_truncates_the_log() -> Result<()> {
    let (db, _path, _dir) = create_test_db()?;

    for _ in 0..5 {
        let mut tx = db.new_tx()?;
        let blk = tx.append("t.dat")?;
        tx.pin(&blk)?;
        tx.set_int(&blk, 0, 7, true)?;
        tx.commit()?;
    }
    assert!(db.file_manager().block_count("test.log")? >= 1);

    db.checkpoint()?;

    // the whole history collapses to one block holding one record
    assert_eq!(db.file_manager().block_count("test.log")?, 1);
    let records: Vec<LogRecord> = db
        .log_manager()
        .iterator()?
        .map(|bytes| LogRecord::from_bytes(&bytes?))
        .collect::<Result<_, _>>()?;
    assert_eq!(records, vec![LogRecord::Checkpoint { active: vec![] }]);
    Ok(())
}

#[test]
fn test_data_survives_a_checkpoint_and_restart() -> Result<()> {
    let (db, path, _dir) = create_test_db()?;

    let mut tx = db.new_tx()?;
    let blk = tx.append("t.dat")?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 16, 321, true)?;
    tx.set_string(&blk, 32, "checkpointed", true)?;
    tx.commit()?;

    db.checkpoint()?;
    drop(db);

    let db = common::reopen_db(&path)?;
    let mut tx = db.new_tx()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 16)?, 321);
    assert_eq!(tx.get_string(&blk, 32)?, "checkpointed");
    tx.commit()?;
    Ok(())
}

#[test]
fn test_restart_recovery_stops_at_the_checkpoint() -> Result<()> {
    let (db, path, _dir) = create_test_db()?;
    let blk;

    {
        let mut setup = db.new_tx()?;
        blk = setup.append("t.dat")?;
        setup.pin(&blk)?;
        setup.set_int(&blk, 0, 10, true)?;
        setup.commit()?;

        db.checkpoint()?;

        // unfinished work after the checkpoint still gets undone
        let mut unfinished = db.new_tx()?;
        unfinished.pin(&blk)?;
        unfinished.set_int(&blk, 0, 20, true)?;
        drop(unfinished);
    }
    drop(db);

    let db = common::reopen_db(&path)?;
    let mut tx = db.new_tx()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 0)?, 10);
    tx.commit()?;
    Ok(())
}

#[test]
fn test_checkpoint_waits_for_active_requests() -> Result<()> {
    let (db, _path, _dir) = create_test_db()?;
    let db = Arc::new(db);

    let db2 = db.clone();
    let request = std::thread::spawn(move || {
        let _ticket = db2.begin_request();
        std::thread::sleep(Duration::from_millis(80));
    });

    // let the request get its ticket first
    std::thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    db.checkpoint()?;
    assert!(start.elapsed() >= Duration::from_millis(40));

    request.join().unwrap();
    Ok(())
}

#[test]
fn test_repeated_checkpoints_are_harmless() -> Result<()> {
    let (db, _path, _dir) = create_test_db()?;

    let mut tx = db.new_tx()?;
    let blk = tx.append("t.dat")?;
    tx.pin(&blk)?;
    tx.set_int(&blk, 0, 1, true)?;
    tx.commit()?;

    db.checkpoint()?;
    db.checkpoint()?;
    assert_eq!(db.file_manager().block_count("test.log")?, 1);

    let mut tx = db.new_tx()?;
    tx.pin(&blk)?;
    assert_eq!(tx.get_int(&blk, 0)?, 1);
    tx.commit()?;
    Ok(())
}
