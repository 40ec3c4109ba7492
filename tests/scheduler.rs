use std::time::Duration;
use stego_sentinel::{
    analyzer::evaluate,
    config::Config,
    error::SchedulerError,
    job::{HashPasswordRequest, HashRequest, HmacRequest, Job, JobOutput, VerifyPasswordRequest},
    pool::JobHandle,
    scheduler::{ANALYSIS_POOL, SchedulerHandle},
};

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const IV: &str = "a0a1a2a3a4a5a6a7a8a9aaabacadaeaf";

fn cfg() -> Config {
    let mut cfg = Config::default();
    cfg.scheduler.analysis_workers = 2;
    cfg.scheduler.encryption_workers = 1;
    cfg.scheduler.hashing_workers = 1;
    cfg
}

async fn settle<T>(handle: JobHandle<T>) -> Result<T, SchedulerError> {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("job handle never resolved")
}

#[tokio::test]
async fn submissions_fail_before_start() {
    let scheduler = SchedulerHandle::new(&cfg());
    assert!(!scheduler.is_running());
    assert_eq!(
        settle(scheduler.analyze(vec![1, 2, 3], "a.bin", "application/octet-stream")).await,
        Err(SchedulerError::PoolUninitialized)
    );
    assert_eq!(
        settle(scheduler.hash(b"abc".to_vec())).await,
        Err(SchedulerError::PoolUninitialized)
    );

    let stats = scheduler.pool_stats();
    assert_eq!(stats.name, ANALYSIS_POOL);
    assert_eq!(stats.pool_size, 0);
    assert!(!scheduler.stats().running);
}

#[tokio::test]
async fn analysis_runs_on_the_steganography_pool() {
    let cfg = cfg();
    let scheduler = SchedulerHandle::started(&cfg).unwrap();
    let buf: Vec<u8> = (0..8192u32).map(|i| (i * 17 % 256) as u8).collect();

    let mut report = settle(scheduler.analyze(buf.clone(), "a.png", "image/png"))
        .await
        .unwrap();
    report.analysis_time_ms = 0;
    assert_eq!(report, evaluate(&cfg.analysis, &buf, "a.png", "image/png"));

    let stats = scheduler.pool_stats();
    assert_eq!(stats.pool_size, 2);
    assert_eq!(stats.available_workers, 2);
    assert_eq!(stats.completed_jobs, 1);
    scheduler.shutdown();
}

#[tokio::test]
async fn concurrent_analyses_share_the_pool() {
    let scheduler = SchedulerHandle::started(&cfg()).unwrap();
    let handles: Vec<_> = (0..8u8)
        .map(|i| scheduler.analyze(vec![i; 2048], &format!("f{i}.bin"), "application/octet-stream"))
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let report = settle(handle).await.unwrap();
        assert_eq!(report.filename, format!("f{i}.bin"));
    }
    assert_eq!(scheduler.pool_stats().completed_jobs, 8);
    scheduler.shutdown();
}

#[tokio::test]
async fn jobs_are_routed_by_kind() {
    let scheduler = SchedulerHandle::started(&cfg()).unwrap();

    let digest = settle(scheduler.submit(Job::Hash(HashRequest { data: Vec::new() })))
        .await
        .unwrap();
    assert_eq!(
        digest,
        JobOutput::Digest(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".to_string()
        )
    );

    let sealed = settle(scheduler.encrypt(b"room secret".to_vec(), KEY, IV))
        .await
        .unwrap();
    let plain = settle(scheduler.decrypt(&sealed.ciphertext_hex, KEY, IV, &sealed.tag_hex))
        .await
        .unwrap();
    assert_eq!(plain, b"room secret");

    let stats = scheduler.stats();
    assert!(stats.running);
    assert_eq!(stats.encryption.completed_jobs, 2);
    assert_eq!(stats.hashing.completed_jobs, 1);
    assert_eq!(stats.analysis.completed_jobs, 0);
    scheduler.shutdown();
}

#[tokio::test]
async fn file_encryption_and_hmac_run_on_the_encryption_pool() {
    let scheduler = SchedulerHandle::started(&cfg()).unwrap();

    let sealed = settle(scheduler.encrypt_file(b"attachment bytes".to_vec(), KEY))
        .await
        .unwrap();
    assert_eq!(sealed.iv_hex.len(), 32);
    let plain = settle(scheduler.decrypt(&sealed.ciphertext_hex, KEY, &sealed.iv_hex, &sealed.tag_hex))
        .await
        .unwrap();
    assert_eq!(plain, b"attachment bytes");

    let mac = settle(scheduler.hmac(b"message".to_vec(), "room-secret"))
        .await
        .unwrap();
    assert_eq!(mac.len(), 64);
    assert_eq!(
        settle(scheduler.verify_hmac(b"message".to_vec(), &mac, "room-secret")).await,
        Ok(true)
    );
    assert_eq!(
        settle(scheduler.verify_hmac(b"message".to_vec(), &mac, "other-secret")).await,
        Ok(false)
    );

    let routed = settle(scheduler.submit(Job::Hmac(HmacRequest {
        data: b"message".to_vec(),
        secret: "room-secret".to_string(),
    })))
    .await
    .unwrap();
    assert_eq!(routed, JobOutput::Mac(mac));

    let stats = scheduler.stats();
    assert_eq!(stats.encryption.completed_jobs, 6);
    assert_eq!(stats.hashing.completed_jobs, 0);
    scheduler.shutdown();
}

#[tokio::test]
async fn passwords_are_hashed_on_the_hashing_pool() {
    let scheduler = SchedulerHandle::started(&cfg()).unwrap();

    let hash = settle(scheduler.hash_password("correct horse", Some(4)))
        .await
        .unwrap();
    assert_eq!(
        settle(scheduler.verify_password("correct horse", &hash)).await,
        Ok(true)
    );
    assert_eq!(
        settle(scheduler.verify_password("battery staple", &hash)).await,
        Ok(false)
    );

    let routed = settle(scheduler.submit(Job::HashPassword(HashPasswordRequest {
        password: "pw".to_string(),
        cost: 4,
    })))
    .await
    .unwrap();
    let routed_hash = match routed {
        JobOutput::PasswordHash(hash) => hash,
        other => panic!("unexpected output: {other:?}"),
    };
    let verified = settle(scheduler.submit(Job::VerifyPassword(VerifyPasswordRequest {
        password: "pw".to_string(),
        hash: routed_hash,
    })))
    .await
    .unwrap();
    assert_eq!(verified, JobOutput::Verified(true));

    match settle(scheduler.verify_password("pw", "not a bcrypt hash")).await {
        Err(SchedulerError::WorkerExecutionFailed(msg)) => assert!(msg.contains("bcrypt")),
        other => panic!("unexpected result: {other:?}"),
    }

    let stats = scheduler.stats();
    assert_eq!(stats.hashing.completed_jobs, 5);
    assert_eq!(stats.hashing.failed_jobs, 1);
    assert_eq!(stats.encryption.completed_jobs, 0);
    scheduler.shutdown();
}

#[tokio::test]
async fn bad_key_fails_only_that_job() {
    let scheduler = SchedulerHandle::started(&cfg()).unwrap();
    match settle(scheduler.encrypt(b"x".to_vec(), "abcd", IV)).await {
        Err(SchedulerError::WorkerExecutionFailed(msg)) => assert!(msg.contains("key")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(settle(scheduler.hash(b"x".to_vec())).await.is_ok());
    assert_eq!(scheduler.stats().encryption.failed_jobs, 1);
    scheduler.shutdown();
}

#[tokio::test]
async fn shutdown_is_idempotent_and_restartable() {
    let scheduler = SchedulerHandle::started(&cfg()).unwrap();
    let clone = scheduler.clone();

    scheduler.shutdown();
    scheduler.shutdown();
    assert!(!clone.is_running());
    assert_eq!(
        settle(clone.analyze(vec![0; 16], "a", "image/png")).await,
        Err(SchedulerError::ShutDown)
    );
    assert_eq!(clone.pool_stats().pool_size, 0);

    clone.start().unwrap();
    assert!(scheduler.is_running());
    assert!(settle(scheduler.analyze(vec![0; 16], "a", "image/png")).await.is_ok());
    scheduler.shutdown();
}
