//! End-to-end pipeline tests: intake → processor → result, against scripted nodes.

use alloy::consensus::Transaction;
use alloy::primitives::{hex, Address, Signature, B256, U256};
use std::sync::Arc;
use std::time::Duration;

use payout_engine::chain::registry::{ChainClient, ChainRegistry};
use payout_engine::chain::tron::{decode_tron_address, encode_tron_address, TronRpc};
use payout_engine::chain::types::ChainType;
use payout_engine::lifecycle::{PayoutService, Shutdown};
use payout_engine::payout::types::{BatchPayoutRequest, JobErrorKind, PayoutError};
use payout_engine::payout::{fail_abandoned, ChannelResultSink, JobQueue, ResultSink, SignerSet, WorkerPool};

mod common;
use common::*;

fn service_with(rpc: Arc<MockEvmRpc>) -> PayoutService {
    PayoutService::from_parts(test_config(), evm_registry(vec![(ETH_CHAIN, rpc)]), local_signers())
}

#[tokio::test]
async fn test_batch_jobs_get_sequential_nonces() {
    let rpc = Arc::new(MockEvmRpc::new(5));
    let service = service_with(rpc.clone());

    let jobs = service.intake().validate(&evm_batch("b1", ETH_CHAIN, 3)).unwrap();
    let mut results = Vec::new();
    for job in &jobs {
        results.push(service.processor().process(job).await);
    }

    assert!(results.iter().all(|r| r.success), "{:?}", results);
    assert_eq!(
        results.iter().map(|r| r.nonce).collect::<Vec<_>>(),
        vec![Some(5), Some(6), Some(7)]
    );
    assert_eq!(rpc.sent_nonces(), vec![5, 6, 7]);
    // Fetched once, then allocated locally.
    assert_eq!(rpc.queries(), 1);

    for (result, tx) in results.iter().zip(rpc.sent()) {
        assert_eq!(result.tx_hash.as_deref(), Some(tx.tx_hash().to_string().as_str()));
        assert_eq!(tx.chain_id(), Some(ETH_CHAIN));
        assert_eq!(tx.value(), U256::from(1_000_000_000_000_000u64));
    }
}

#[tokio::test]
async fn test_failed_broadcast_keeps_optimistic_allocation() {
    let rpc = Arc::new(MockEvmRpc::new(7));
    rpc.script([Err("insufficient funds for gas * price + value".to_string())]);
    let service = service_with(rpc.clone());

    let jobs = service.intake().validate(&evm_batch("b1", ETH_CHAIN, 2)).unwrap();
    let first = service.processor().process(&jobs[0]).await;
    let second = service.processor().process(&jobs[1]).await;

    assert!(!first.success);
    assert_eq!(first.error.as_ref().unwrap().kind, JobErrorKind::Submission);
    assert!(first.tx_hash.is_none());
    assert_eq!(first.nonce, Some(7));

    // Not a nonce error: the cache advances and no nonce is handed out twice.
    assert!(second.success);
    assert_eq!(second.nonce, Some(8));
    assert_eq!(rpc.sent_nonces(), vec![8]);
    assert_eq!(rpc.queries(), 1);
}

#[tokio::test]
async fn test_nonce_conflict_is_classified_and_resets_cache() {
    let rpc = Arc::new(MockEvmRpc::new(3));
    rpc.script([Err("nonce too low: next nonce 4, tx nonce 3".to_string())]);
    let service = service_with(rpc.clone());

    let jobs = service.intake().validate(&evm_batch("b1", ETH_CHAIN, 2)).unwrap();
    let conflicted = service.processor().process(&jobs[0]).await;
    assert_eq!(conflicted.nonce, Some(3));
    assert_eq!(conflicted.error.unwrap().kind, JobErrorKind::NonceConflict);
    assert_eq!(service.processor().nonces().next_nonce(ETH_CHAIN, TEST_ADDRESS), None);

    let retried = service.processor().process(&jobs[1]).await;
    assert!(retried.success);
    assert_eq!(retried.nonce, Some(3));
    assert_eq!(rpc.queries(), 2);
}

#[tokio::test]
async fn test_sender_mismatch_fails_before_nonce_acquisition() {
    let rpc = Arc::new(MockEvmRpc::new(0));
    let service = service_with(rpc.clone());

    let mut batch = evm_batch("b1", ETH_CHAIN, 1);
    batch.from_address = RECIPIENT.to_string();
    let jobs = service.intake().validate(&batch).unwrap();
    let result = service.processor().process(&jobs[0]).await;

    assert_eq!(result.nonce, None);
    let error = result.error.unwrap();
    assert_eq!(error.kind, JobErrorKind::Signing);
    assert!(error.message.contains("not controlled"));
    assert_eq!(rpc.queries(), 0);
    assert!(rpc.sent().is_empty());
}

fn refusing_service(rpc: Arc<MockEvmRpc>, message: &str) -> PayoutService {
    let signers = SignerSet::new(Arc::new(RefusingSigner {
        address: TEST_ADDRESS,
        message: message.to_string(),
    }));
    PayoutService::from_parts(test_config(), evm_registry(vec![(ETH_CHAIN, rpc)]), signers)
}

#[tokio::test]
async fn test_signing_refusal_releases_lease_and_keeps_cache() {
    let rpc = Arc::new(MockEvmRpc::new(0));
    let service = refusing_service(rpc.clone(), "key disabled");

    let jobs = service.intake().validate(&evm_batch("b1", ETH_CHAIN, 2)).unwrap();
    let mut nonces = Vec::new();
    for job in &jobs {
        let result = service.processor().process(job).await;
        assert_eq!(result.error.unwrap().kind, JobErrorKind::Signing);
        nonces.push(result.nonce);
    }

    // The second job was not blocked by the first one's lease.
    assert_eq!(nonces, vec![Some(0), Some(1)]);
    assert_eq!(service.processor().nonces().next_nonce(ETH_CHAIN, TEST_ADDRESS), Some(2));
    assert_eq!(rpc.queries(), 1);
    assert!(rpc.sent().is_empty());
}

#[tokio::test]
async fn test_nonce_signing_error_resets_cache() {
    let rpc = Arc::new(MockEvmRpc::new(4));
    let service = refusing_service(rpc.clone(), "nonce mismatch");

    let jobs = service.intake().validate(&evm_batch("b1", ETH_CHAIN, 2)).unwrap();
    let first = service.processor().process(&jobs[0]).await;
    assert!(!first.success);
    assert_eq!(first.nonce, Some(4));
    assert_eq!(first.error.unwrap().kind, JobErrorKind::Signing);
    assert_eq!(service.processor().nonces().next_nonce(ETH_CHAIN, TEST_ADDRESS), None);

    // The next job goes back to the chain and gets the same nonce.
    let second = service.processor().process(&jobs[1]).await;
    assert_eq!(second.nonce, Some(4));
    assert_eq!(rpc.queries(), 2);
}

#[tokio::test]
async fn test_gas_estimation_failure_uses_fallback_limit() {
    let rpc = Arc::new(MockEvmRpc::new(0).without_estimates());
    let service = service_with(rpc.clone());

    let jobs = service.intake().validate(&evm_batch("b1", ETH_CHAIN, 1)).unwrap();
    let result = service.processor().process(&jobs[0]).await;

    assert!(result.success);
    let tx = &rpc.sent()[0];
    // 21 000 native fallback with the default 120 % buffer.
    assert_eq!(tx.gas_limit(), 25_200);
}

#[tokio::test]
async fn test_erc20_transfer_targets_token_contract() {
    let rpc = Arc::new(MockEvmRpc::new(0));
    let service = service_with(rpc.clone());

    let usdt = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
    let mut batch = evm_batch("b1", ETH_CHAIN, 1);
    batch.items[0].token_address = Some(usdt.to_string());
    batch.items[0].token_symbol = "USDT".to_string();

    let jobs = service.intake().validate(&batch).unwrap();
    assert!(service.processor().process(&jobs[0]).await.success);

    let tx = &rpc.sent()[0];
    assert_eq!(tx.to(), Some(usdt.parse::<Address>().unwrap()));
    assert_eq!(tx.value(), U256::ZERO);
    // transfer(address,uint256)
    assert_eq!(tx.input()[..4], [0xa9, 0x05, 0x9c, 0xbb]);
}

#[tokio::test]
async fn test_job_deadline_expires_and_keeps_allocation() {
    let rpc = Arc::new(MockEvmRpc::new(0).with_send_delay(Duration::from_secs(5)));
    let mut config = test_config();
    config.workers.job_timeout_secs = 1;
    let service = PayoutService::from_parts(config, evm_registry(vec![(ETH_CHAIN, rpc.clone())]), local_signers());

    let jobs = service.intake().validate(&evm_batch("b1", ETH_CHAIN, 1)).unwrap();
    let result = service.processor().process(&jobs[0]).await;

    assert_eq!(result.nonce, Some(0));
    assert_eq!(result.error.unwrap().kind, JobErrorKind::Timeout);
    // The broadcast may still land, so nonce 0 is not reused.
    assert_eq!(service.processor().nonces().next_nonce(ETH_CHAIN, TEST_ADDRESS), Some(1));
}

#[tokio::test]
async fn test_unsupported_chain_rejects_whole_batch() {
    let rpc = Arc::new(MockEvmRpc::new(0));
    let service = service_with(rpc);

    let err = service.intake().submit(evm_batch("b1", 999, 2)).await.unwrap_err();
    assert!(matches!(err, PayoutError::UnsupportedChain(999)));
    assert!(service.queue().is_empty().await);
}

#[tokio::test]
async fn test_one_bad_item_rejects_whole_batch() {
    let rpc = Arc::new(MockEvmRpc::new(0));
    let service = service_with(rpc);

    let mut batch = evm_batch("b1", ETH_CHAIN, 3);
    batch.items[2].amount = "12.5".to_string();

    match service.intake().submit(batch).await.unwrap_err() {
        PayoutError::Validation(e) => assert_eq!(e.item_index, Some(2)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(service.queue().is_empty().await);
}

#[tokio::test]
async fn test_intake_accepts_and_queues_every_item() {
    let rpc = Arc::new(MockEvmRpc::new(0));
    let service = service_with(rpc);

    let response = service.intake().submit(evm_batch("b1", ETH_CHAIN, 4)).await.unwrap();
    assert_eq!(response.batch_id, "b1");
    assert_eq!(response.message, "Queued 4 payments for processing");
    assert_eq!(service.queue().len().await, 4);
}

#[tokio::test]
async fn test_worker_pool_drains_queue_and_reports_results() {
    let rpc = Arc::new(MockEvmRpc::new(100));
    let service = service_with(rpc.clone());
    let (sink, mut results) = ChannelResultSink::new();
    let sink: Arc<dyn ResultSink> = Arc::new(sink);

    let shutdown = Shutdown::new();
    let pool = WorkerPool::spawn(4, service.processor().clone(), service.queue(), sink, &shutdown);
    assert_eq!(pool.size(), 4);

    service.intake().submit(evm_batch("b1", ETH_CHAIN, 6)).await.unwrap();

    let mut received = Vec::new();
    for _ in 0..6 {
        let result = tokio::time::timeout(Duration::from_secs(5), results.recv())
            .await
            .unwrap()
            .unwrap();
        received.push(result);
    }

    assert!(received.iter().all(|r| r.success && r.batch_id == "b1"));
    let mut nonces: Vec<u64> = received.iter().filter_map(|r| r.nonce).collect();
    nonces.sort_unstable();
    assert_eq!(nonces, (100..106).collect::<Vec<_>>());

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), pool.join()).await.unwrap();
}

#[tokio::test]
async fn test_jobs_queued_at_shutdown_are_reported_abandoned() {
    let rpc = Arc::new(MockEvmRpc::new(0).with_send_delay(Duration::from_millis(200)));
    let service = service_with(rpc.clone());
    let (sink, mut results) = ChannelResultSink::new();
    let sink: Arc<dyn ResultSink> = Arc::new(sink);

    let shutdown = Shutdown::new();
    let pool = WorkerPool::spawn(1, service.processor().clone(), service.queue(), sink.clone(), &shutdown);
    service.intake().submit(evm_batch("b1", ETH_CHAIN, 5)).await.unwrap();

    // Let the single worker pick up the first job, then stop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();
    service.queue().close();
    tokio::time::timeout(Duration::from_secs(5), pool.join()).await.unwrap();

    let abandoned = fail_abandoned(service.queue().as_ref(), sink.as_ref()).await;
    assert_eq!(abandoned, 4);
    assert!(service.queue().is_empty().await);

    let mut received = Vec::new();
    while let Ok(result) = results.try_recv() {
        received.push(result);
    }
    assert_eq!(received.len(), 5);
    assert!(received[0].success);
    for result in &received[1..] {
        assert!(!result.success);
        assert_eq!(result.error.as_ref().unwrap().kind, JobErrorKind::Abandoned);
        assert_eq!(result.nonce, None);
    }
    assert_eq!(rpc.sent_nonces(), vec![0]);
}

fn tron_service(node: Arc<MockTronNode>) -> PayoutService {
    let registry = Arc::new(ChainRegistry::from_clients([(
        chain_config(TRON_CHAIN, ChainType::Tron),
        ChainClient::Tron(node as Arc<dyn TronRpc>),
    )]));
    PayoutService::from_parts(test_config(), registry, local_signers())
}

fn tron_recipient() -> String {
    encode_tron_address(RECIPIENT.parse().unwrap())
}

fn tron_batch(token: Option<&str>) -> BatchPayoutRequest {
    let mut payout = item("t1", &tron_recipient(), "2500000");
    payout.token_address = token.map(str::to_string);
    payout.token_decimals = 6;
    BatchPayoutRequest {
        batch_id: "tron-1".to_string(),
        user_id: "user-1".to_string(),
        from_address: tron_sender(),
        chain_id: TRON_CHAIN,
        items: vec![payout],
    }
}

#[tokio::test]
async fn test_tron_transfer_is_signed_over_tx_id() {
    let node = Arc::new(MockTronNode::default());
    let service = tron_service(node.clone());

    let jobs = service.intake().validate(&tron_batch(None)).unwrap();
    let result = service.processor().process(&jobs[0]).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.nonce, None);

    let broadcasts = node.broadcasts.lock().unwrap().clone();
    assert_eq!(broadcasts.len(), 1);
    let tx = &broadcasts[0];
    assert_eq!(result.tx_hash.as_deref(), Some(tx.tx_id.as_str()));

    let signature_bytes = hex::decode(&tx.signature[0]).unwrap();
    assert_eq!(signature_bytes.len(), 65);
    assert!(signature_bytes[64] <= 1);

    let signature = Signature::from_raw(&signature_bytes).unwrap();
    let digest = B256::from_slice(&hex::decode(&tx.tx_id).unwrap());
    assert_eq!(signature.recover_address_from_prehash(&digest).unwrap(), TEST_ADDRESS);
}

#[tokio::test]
async fn test_trc20_transfer_passes_fee_limit() {
    let node = Arc::new(MockTronNode::default());
    let service = tron_service(node.clone());

    let usdt = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    let jobs = service.intake().validate(&tron_batch(Some(usdt))).unwrap();
    assert!(service.processor().process(&jobs[0]).await.success);

    let calls = node.trc20_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let (contract, to, amount, fee_limit) = &calls[0];
    assert_eq!(contract, usdt);
    assert_eq!(*to, decode_tron_address(&tron_recipient()).unwrap());
    assert_eq!(*amount, U256::from(2_500_000u64));
    assert_eq!(*fee_limit, 100_000_000);
}

#[tokio::test]
async fn test_tron_broadcast_rejection_is_reported() {
    let node = Arc::new(MockTronNode::rejecting("CONTRACT_VALIDATE_ERROR: balance is not sufficient"));
    let service = tron_service(node);

    let jobs = service.intake().validate(&tron_batch(None)).unwrap();
    let result = service.processor().process(&jobs[0]).await;

    let error = result.error.unwrap();
    assert_eq!(error.kind, JobErrorKind::Submission);
    assert!(error.message.contains("balance is not sufficient"));
}
