use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use basaltdb::BufferPoolError;
use basaltdb::storage::page::BlockId;

#[path = "../common/mod.rs"]
mod common;
use common::{POOL_SIZE, create_test_managers};

#[test]
fn test_pool_serves_more_blocks_than_frames() -> Result<()> {
    let (fm, _lm, bm, _dir) = create_test_managers()?;

    // twice as many blocks as frames, pinned and released one at a time
    for n in 0..(2 * POOL_SIZE as u64) {
        fm.append("t.dat")?;
        let blk = BlockId::new("t.dat", n);
        let buf = bm.pin(&blk)?;
        {
            let mut frame = buf.lock();
            frame.page_mut().set_int(0, n as i32);
            frame.set_modified(1, None);
        }
        bm.unpin(&buf);
    }

    // every block is readable again, through eviction and reload
    for n in 0..(2 * POOL_SIZE as u64) {
        let blk = BlockId::new("t.dat", n);
        let buf = bm.pin(&blk)?;
        assert_eq!(buf.lock().page().get_int(0), n as i32);
        bm.unpin(&buf);
    }
    Ok(())
}

#[test]
fn test_exhausted_pool_rejects_after_wait() -> Result<()> {
    let (fm, _lm, bm, _dir) = create_test_managers()?;
    for _ in 0..=POOL_SIZE as u64 {
        fm.append("t.dat")?;
    }

    let mut held = Vec::new();
    for n in 0..POOL_SIZE as u64 {
        held.push(bm.pin(&BlockId::new("t.dat", n))?);
    }
    assert_eq!(bm.available(), 0);

    assert!(matches!(
        bm.pin(&BlockId::new("t.dat", POOL_SIZE as u64)),
        Err(BufferPoolError::PoolExhausted)
    ));

    // pinning an already resident block needs no free frame
    let extra = bm.pin(&BlockId::new("t.dat", 0))?;
    bm.unpin(&extra);

    for buf in &held {
        bm.unpin(buf);
    }
    Ok(())
}

#[test]
fn test_waiting_pin_succeeds_once_a_frame_frees_up() -> Result<()> {
    let (fm, _lm, bm, _dir) = create_test_managers()?;
    for _ in 0..=POOL_SIZE as u64 {
        fm.append("t.dat")?;
    }

    let mut held = Vec::new();
    for n in 0..POOL_SIZE as u64 {
        held.push(bm.pin(&BlockId::new("t.dat", n))?);
    }

    let bm2 = bm.clone();
    let waiter = std::thread::spawn(move || bm2.pin(&BlockId::new("t.dat", POOL_SIZE as u64)));

    std::thread::sleep(Duration::from_millis(30));
    bm.unpin(&held.pop().unwrap());

    let buf = waiter.join().unwrap()?;
    bm.unpin(&buf);
    for buf in &held {
        bm.unpin(buf);
    }
    Ok(())
}

#[test]
fn test_dirty_page_survives_eviction() -> Result<()> {
    let (fm, _lm, bm, _dir) = create_test_managers()?;
    for _ in 0..=(POOL_SIZE as u64) {
        fm.append("t.dat")?;
    }

    let target = BlockId::new("t.dat", 0);
    let buf = bm.pin(&target)?;
    {
        let mut frame = buf.lock();
        frame.page_mut().set_string(50, "must survive");
        frame.set_modified(9, None);
    }
    bm.unpin(&buf);

    // cycle every frame through other blocks to force the eviction
    for n in 1..=(POOL_SIZE as u64) {
        let other = bm.pin(&BlockId::new("t.dat", n))?;
        bm.unpin(&other);
    }

    let buf = bm.pin(&target)?;
    assert_eq!(buf.lock().page().get_string(50)?, "must survive");
    bm.unpin(&buf);
    Ok(())
}

#[test]
fn test_random_workload_reads_back_what_it_wrote() -> Result<()> {
    let (fm, _lm, bm, _dir) = create_test_managers()?;
    const BLOCKS: u64 = 8;
    for _ in 0..BLOCKS {
        fm.append("t.dat")?;
    }

    let mut rng = StdRng::seed_from_u64(42);
    let mut expected = vec![0i32; BLOCKS as usize];
    for _ in 0..200 {
        let n = rng.gen_range(0..BLOCKS);
        let val = rng.gen_range(-1000..1000);
        let blk = BlockId::new("t.dat", n);
        let buf = bm.pin(&blk)?;
        {
            let mut frame = buf.lock();
            frame.page_mut().set_int(0, val);
            frame.set_modified(1, None);
        }
        bm.unpin(&buf);
        expected[n as usize] = val;
    }

    for n in 0..BLOCKS {
        let buf = bm.pin(&BlockId::new("t.dat", n))?;
        assert_eq!(buf.lock().page().get_int(0), expected[n as usize]);
        bm.unpin(&buf);
    }
    Ok(())
}
