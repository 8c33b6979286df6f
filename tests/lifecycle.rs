// tests/lifecycle.rs

//! Server lifecycle, failure isolation and call termination paths.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::Instant;

use pubsub_rpc::codec::{decode_tuple, encode_tuple, Kind, Signature, Value};
use pubsub_rpc::{
    // ---
    create_memory_transport_with_hub,
    Context,
    Envelope,
    Export,
    MemoryHub,
    Result,
    RpcClient,
    RpcConfig,
    RpcError,
    RpcServer,
    SubjectScheme,
    Subscription,
    TransportConfig,
    TransportPtr,
};

async fn transport(hub: &Arc<MemoryHub>, node_id: &str) -> TransportPtr {
    create_memory_transport_with_hub(TransportConfig::memory(node_id), hub.clone())
        .await
        .expect("memory transport")
}

async fn client(hub: &Arc<MemoryHub>) -> RpcClient {
    RpcClient::new(transport(hub, "client").await, &RpcConfig::memory("client"))
}

fn length_export() -> Export {
    Export::typed("foo", "f", |(x,): (String,)| async move {
        Ok((x.len() as u32,))
    })
}

#[tokio::test]
async fn test_bad_request_gets_error_reply_and_server_keeps_serving() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server.serve(vec![length_export()]).await?;
    let client = client(&hub).await;
    let cx = Context::with_timeout(Duration::from_secs(5));

    // A u8 of 5 reads as a string length with no bytes behind it.
    let wrong = Signature::new(vec![Kind::U8], vec![Kind::U32]);
    let err = client
        .invoke(&cx, "foo", "f", &[Value::U8(5)], &wrong)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Remote(_)), "got {err:?}");
    assert!(err.is_transport());

    let (len,): (u32,) = client.call(&cx, "foo", "f", ("abcd".to_string(),)).await?;
    assert_eq!(len, 4);

    server.stop().await?;
    assert_eq!(hub.active_subscription_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_handler_failure_is_remote_error() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server
        .serve(vec![
            length_export(),
            Export::typed("foo", "broken", |(): ()| async move {
                Err::<(u32,), _>(RpcError::Transport("database unavailable".into()))
            }),
        ])
        .await?;
    let client = client(&hub).await;
    let cx = Context::with_timeout(Duration::from_secs(5));

    let err = client
        .call::<(), (u32,)>(&cx, "foo", "broken", ())
        .await
        .unwrap_err();
    match err {
        RpcError::Remote(message) => assert!(message.contains("database unavailable")),
        other => panic!("expected remote error, got {other:?}"),
    }

    let (len,): (u32,) = client.call(&cx, "foo", "f", ("x".to_string(),)).await?;
    assert_eq!(len, 1);

    server.stop().await
}

#[tokio::test]
async fn test_handler_panic_is_remote_error() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server
        .serve(vec![Export::typed("math", "div", |(x,): (u32,)| async move {
            if x == 0 {
                panic!("division by zero");
            }
            Ok((100 / x,))
        })])
        .await?;
    let client = client(&hub).await;
    let cx = Context::with_timeout(Duration::from_secs(5));

    let err = client
        .call::<(u32,), (u32,)>(&cx, "math", "div", (0,))
        .await
        .unwrap_err();
    match err {
        RpcError::Remote(message) => assert!(message.contains("division by zero"), "{message}"),
        other => panic!("expected remote error, got {other:?}"),
    }

    let (quotient,): (u32,) = client.call(&cx, "math", "div", (4,)).await?;
    assert_eq!(quotient, 25);

    server.stop().await?;
    assert_eq!(hub.active_subscription_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_stop_answers_requests_already_delivered() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server.serve(vec![length_export()]).await?;

    let caller = transport(&hub, "caller").await;
    let reply_to = caller.new_inbox();
    let mut replies = caller.subscribe(Subscription::from(&reply_to)).await?;

    // Queued in the server's inbox; the dispatch loop has not run yet.
    let subject = SubjectScheme::default().request_subject("foo", "f");
    for word in ["a", "bb", "ccc"] {
        let payload = encode_tuple(&[Value::string(word)], &[Kind::String])?;
        caller
            .publish(Envelope::request(subject.clone(), payload, reply_to.clone()))
            .await?;
    }

    server.stop().await?;
    assert_eq!(hub.active_subscription_count().await, 1);

    let mut lengths = Vec::new();
    for _ in 0..3 {
        let reply = tokio::time::timeout(Duration::from_secs(1), replies.inbox.recv())
            .await
            .expect("request dropped on stop")
            .expect("reply inbox closed");
        assert!(!reply.is_error(), "error reply: {:?}", reply.error);
        let values = decode_tuple(&reply.payload, &[Kind::U32])?;
        let [Value::U32(len)] = values.as_slice() else {
            panic!("unexpected reply {values:?}");
        };
        lengths.push(*len);
    }
    lengths.sort_unstable();
    assert_eq!(lengths, [1, 2, 3]);

    caller.unsubscribe(replies).await?;
    assert_eq!(hub.active_subscription_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_reply_decode_failure_is_decode_error() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server
        .serve(vec![Export::typed("foo", "g", |(): ()| async move {
            Ok((7u8,))
        })])
        .await?;
    let client = client(&hub).await;

    // Reply is one byte; a u32 needs four.
    let sig = Signature::new(vec![], vec![Kind::U32]);
    let err = client
        .invoke(&Context::background(), "foo", "g", &[], &sig)
        .await
        .unwrap_err();
    assert!(err.is_decode(), "got {err:?}");

    server.stop().await
}

#[tokio::test]
async fn test_request_without_reply_subject_is_dropped() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server.serve(vec![length_export()]).await?;
    let client = client(&hub).await;

    let subject = SubjectScheme::default().request_subject("foo", "f");
    client
        .transport()
        .publish(Envelope::message(subject, Bytes::from_static(b"\x00")))
        .await?;

    let (len,): (u32,) = client
        .call(&Context::background(), "foo", "f", ("ok".to_string(),))
        .await?;
    assert_eq!(len, 2);

    server.stop().await
}

#[tokio::test]
async fn test_no_responders_after_stop() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server.serve(vec![length_export()]).await?;
    server.stop().await?;

    let client = client(&hub).await;
    let err = client
        .call::<(String,), (u32,)>(&Context::background(), "foo", "f", ("x".to_string(),))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::NoResponders(_)));
    assert_eq!(hub.active_subscription_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_prefixes_must_agree() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server_config = RpcConfig::memory("server").with_prefix("alpha");
    let server = RpcServer::new(transport(&hub, "server").await, &server_config);
    server.serve(vec![length_export()]).await?;

    let other = RpcClient::new(transport(&hub, "c1").await, &RpcConfig::memory("c1").with_prefix("beta"));
    let err = other
        .call::<(String,), (u32,)>(&Context::background(), "foo", "f", ("x".to_string(),))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::NoResponders(_)));

    let same = RpcClient::new(transport(&hub, "c2").await, &RpcConfig::memory("c2").with_prefix("alpha"));
    let (len,): (u32,) = same
        .call(&Context::background(), "foo", "f", ("xyz".to_string(),))
        .await?;
    assert_eq!(len, 3);

    server.stop().await
}

#[tokio::test(start_paused = true)]
async fn test_stop_waits_for_quick_handlers() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let config = RpcConfig::memory("server").with_stop_timeout(Duration::from_secs(5));
    let server = RpcServer::new(transport(&hub, "server").await, &config);

    let started = Arc::new(Notify::new());
    let signal = started.clone();
    server
        .serve(vec![Export::typed("slow", "echo", move |(x,): (u32,)| {
            let signal = signal.clone();
            async move {
                signal.notify_one();
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok((x,))
            }
        })])
        .await?;

    let client = client(&hub).await;
    let call = tokio::spawn(async move {
        client
            .call::<(u32,), (u32,)>(&Context::background(), "slow", "echo", (9,))
            .await
    });

    started.notified().await;
    let begin = Instant::now();
    server.stop().await?;
    assert!(begin.elapsed() < Duration::from_secs(5));

    let (echoed,) = call.await.expect("call task panicked")?;
    assert_eq!(echoed, 9);
    assert_eq!(hub.active_subscription_count().await, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_aborts_handlers_past_timeout() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let config = RpcConfig::memory("server").with_stop_timeout(Duration::from_secs(1));
    let server = RpcServer::new(transport(&hub, "server").await, &config);

    let started = Arc::new(Notify::new());
    let signal = started.clone();
    server
        .serve(vec![Export::typed("slow", "hang", move |(): ()| {
            let signal = signal.clone();
            async move {
                signal.notify_one();
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        })])
        .await?;

    let client = client(&hub).await;
    let call = tokio::spawn(async move {
        let cx = Context::with_timeout(Duration::from_secs(30));
        client.call::<(), ()>(&cx, "slow", "hang", ()).await
    });

    started.notified().await;
    let begin = Instant::now();
    server.stop().await?;
    let waited = begin.elapsed();
    assert!(waited >= Duration::from_secs(1), "stopped after {waited:?}");
    assert!(waited < Duration::from_secs(30), "stopped after {waited:?}");

    // The aborted handler never replies.
    let err = call.await.expect("call task panicked").unwrap_err();
    assert!(matches!(err, RpcError::Timeout));
    assert_eq!(hub.active_subscription_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_cancel_releases_reply_inbox() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let config = RpcConfig::memory("server").with_stop_timeout(Duration::from_millis(50));
    let server = RpcServer::new(transport(&hub, "server").await, &config);
    server
        .serve(vec![Export::typed("slow", "hang", |(): ()| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })])
        .await?;

    let client = client(&hub).await;
    let cx = Context::background();
    let canceller = cx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = client.call::<(), ()>(&cx, "slow", "hang", ()).await.unwrap_err();
    assert!(matches!(err, RpcError::Cancelled));
    assert_eq!(client.transport().active_subscription_count().await, 0);

    server.stop().await
}

#[tokio::test]
async fn test_dropping_server_releases_subscriptions() -> Result<()> {
    // ---
    let hub = MemoryHub::new();
    let server = RpcServer::new(transport(&hub, "server").await, &RpcConfig::memory("server"));
    server.serve(vec![length_export()]).await?;
    assert_eq!(hub.active_subscription_count().await, 1);

    drop(server);

    let deadline = Instant::now() + Duration::from_secs(5);
    while hub.active_subscription_count().await > 0 {
        assert!(Instant::now() < deadline, "subscriptions leaked after drop");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}
