use agora_votes_repository::InMemoryVoteRepository;
use agora_votes_service::{NoopNotifier, RoomRegistry, VoteService};
use agora_votes_shared::types::{TargetRef, VoteType};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Creates a service over a fresh in-memory store with one discussion
fn make_service(notifier: Arc<dyn agora_votes_service::ScoreNotifier>) -> (VoteService, TargetRef) {
    let repository = InMemoryVoteRepository::new();
    let discussion = repository.create_discussion(chrono::Utc::now());
    let service = VoteService::new(Arc::new(repository), notifier);
    (service, TargetRef::discussion(discussion))
}

/// Benchmark a single user toggling the same vote on and off
fn toggle_vote(c: &mut Criterion) {
    let rt = runtime();
    let (service, target) = make_service(Arc::new(NoopNotifier));

    c.bench_function("cast_vote_toggle", |b| {
        b.to_async(&rt).iter(|| async {
            service
                .cast_vote(black_box(target), "alice", VoteType::Upvote)
                .await
                .unwrap()
        })
    });
}

/// Benchmark many distinct users voting on one discussion
fn distinct_voters(c: &mut Criterion) {
    let rt = runtime();
    let (service, target) = make_service(Arc::new(NoopNotifier));
    let mut next_user = 0u64;

    c.bench_function("cast_vote_distinct_users", |b| {
        b.to_async(&rt).iter(|| {
            next_user += 1;
            let user_id = format!("user-{next_user}");
            let service = &service;
            async move {
                service
                    .cast_vote(target, &user_id, VoteType::Downvote)
                    .await
                    .unwrap()
            }
        })
    });
}

/// Benchmark casts that fan out to a room with live subscribers
fn cast_with_subscribers(c: &mut Criterion) {
    let rt = runtime();
    let rooms = RoomRegistry::new(1024);
    let (service, target) = make_service(Arc::new(rooms.clone()));

    let mut group = c.benchmark_group("cast_vote_with_subscribers");
    for size in [1usize, 16, 128] {
        let subscriptions: Vec<_> = (0..size).map(|_| rooms.join(target.target_id)).collect();
        group.bench_function(format!("subscribers_{size}"), |b| {
            b.to_async(&rt).iter(|| async {
                service
                    .cast_vote(target, "alice", VoteType::Upvote)
                    .await
                    .unwrap()
            })
        });
        drop(subscriptions);
    }
    group.finish();
}

criterion_group!(benches, toggle_vote, distinct_voters, cast_with_subscribers);
criterion_main!(benches);
