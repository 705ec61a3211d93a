use anyhow::Result;
use tempfile::TempDir;

use basaltdb::storage::disk::FileManager;
use basaltdb::storage::page::{BlockId, Page};

#[path = "../common/mod.rs"]
mod common;
use common::BLOCK_SIZE;

#[test]
fn test_write_then_read_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let fm = FileManager::new(dir.path().join("db"), BLOCK_SIZE, false)?;

    let blk = fm.append("t.dat")?;
    let mut page = Page::new(BLOCK_SIZE);
    page.set_int(0, -77);
    page.set_string(20, "hello blocks");
    page.set_u64(100, u64::MAX);
    fm.write(&blk, &page, true)?;

    let mut read_back = Page::new(BLOCK_SIZE);
    fm.read(&blk, &mut read_back)?;
    assert_eq!(read_back.get_int(0), -77);
    assert_eq!(read_back.get_string(20)?, "hello blocks");
    assert_eq!(read_back.get_u64(100), u64::MAX);
    Ok(())
}

#[test]
fn test_data_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("db");

    {
        let fm = FileManager::new(&path, BLOCK_SIZE, false)?;
        let blk = fm.append("t.dat")?;
        let mut page = Page::new(BLOCK_SIZE);
        page.set_int(8, 4242);
        fm.write(&blk, &page, true)?;
    }

    let fm = FileManager::new(&path, BLOCK_SIZE, false)?;
    assert!(!fm.is_new());
    assert_eq!(fm.block_count("t.dat")?, 1);

    let mut page = Page::new(BLOCK_SIZE);
    fm.read(&BlockId::new("t.dat", 0), &mut page)?;
    assert_eq!(page.get_int(8), 4242);
    Ok(())
}

#[test]
fn test_append_grows_file_one_block_at_a_time() -> Result<()> {
    let dir = TempDir::new()?;
    let fm = FileManager::new(dir.path().join("db"), BLOCK_SIZE, false)?;

    assert_eq!(fm.block_count("t.dat")?, 0);
    for expected in 0..5u64 {
        let blk = fm.append("t.dat")?;
        assert_eq!(blk.number(), expected);
        assert_eq!(fm.block_count("t.dat")?, expected + 1);
    }
    Ok(())
}

#[test]
fn test_read_past_end_of_file_yields_zeroes() -> Result<()> {
    let dir = TempDir::new()?;
    let fm = FileManager::new(dir.path().join("db"), BLOCK_SIZE, false)?;

    let mut page = Page::new(BLOCK_SIZE);
    page.set_int(0, 999);
    fm.read(&BlockId::new("empty.dat", 7), &mut page)?;
    for offset in (0..BLOCK_SIZE).step_by(4) {
        assert_eq!(page.get_int(offset), 0);
    }
    Ok(())
}

#[test]
fn test_files_are_independent() -> Result<()> {
    let dir = TempDir::new()?;
    let fm = FileManager::new(dir.path().join("db"), BLOCK_SIZE, false)?;

    fm.append("a.dat")?;
    fm.append("a.dat")?;
    fm.append("b.dat")?;

    assert_eq!(fm.block_count("a.dat")?, 2);
    assert_eq!(fm.block_count("b.dat")?, 1);
    Ok(())
}

#[test]
fn test_recreate_wipes_previous_contents() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("db");

    {
        let fm = FileManager::new(&path, BLOCK_SIZE, false)?;
        fm.append("t.dat")?;
    }

    let fm = FileManager::new(&path, BLOCK_SIZE, true)?;
    assert!(fm.is_new());
    assert_eq!(fm.block_count("t.dat")?, 0);
    Ok(())
}
