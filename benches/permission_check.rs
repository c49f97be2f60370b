//! Permission check benchmarks.
//!
//! Measures the cost of resolving a permission against a deep path, with and
//! without the decoded ACL cache, and of reverse principal lookup.
//!
//! # Benchmarks
//!
//! - `can_deep_path_cached`: `can` at depth 12 with the cache enabled
//! - `can_deep_path_uncached`: the same check decoding every ancestor ACL
//! - `find_principals`: readers of a leaf below a populated hierarchy
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench permission_check
//! ```

use std::hint::black_box;
use std::sync::Arc;

use arbor_core::{
    AccessControlConfig, AccessControlService, AclModification, AclOperation, AuthorizableLookup,
    MemoryAuthorizables, MemoryStorage, Permission, Principal, ZONE_CONTENT, install_default_acls,
};
use criterion::{Criterion, criterion_group, criterion_main};

const DEPTH: usize = 12;

fn setup(cache: bool) -> (AccessControlService, String) {
    let registry = Arc::new(MemoryAuthorizables::new());
    for i in 0..8 {
        registry
            .add_member(&format!("group{}", i + 1), &format!("group{i}"))
            .unwrap();
    }
    registry.add_member("group0", "bench-user").unwrap();

    let service = AccessControlService::builder(Arc::new(MemoryStorage::new()))
        .authorizables(registry)
        .config(AccessControlConfig::default().with_cache(cache))
        .build()
        .unwrap();
    install_default_acls(&service).unwrap();

    let admin = service.manager(Principal::admin());
    let mut path = String::from("bench");
    for level in 0..DEPTH {
        // Every other level names someone unrelated, so resolution keeps walking.
        if level % 2 == 0 {
            admin
                .set_acl(
                    ZONE_CONTENT,
                    &path,
                    &[AclModification::grant(
                        &format!("other{level}"),
                        Permission::CAN_READ,
                        AclOperation::Replace,
                    )],
                )
                .unwrap();
        }
        path.push_str(&format!("/level{level}"));
    }
    admin
        .set_acl(
            ZONE_CONTENT,
            "bench",
            &[AclModification::grant("group8", Permission::CAN_WRITE, AclOperation::Or)],
        )
        .unwrap();
    (service, path)
}

fn bench_can(c: &mut Criterion) {
    for (name, cache) in [("can_deep_path_cached", true), ("can_deep_path_uncached", false)] {
        let (service, path) = setup(cache);
        let acm = service.manager(Principal::admin());
        let user = service
            .authorizables()
            .find_authorizable("bench-user")
            .unwrap()
            .unwrap();
        c.bench_function(name, |b| {
            b.iter(|| {
                let allowed = acm
                    .can(black_box(&user), ZONE_CONTENT, black_box(&path), Permission::CAN_WRITE)
                    .unwrap();
                assert!(allowed);
            });
        });
    }
}

fn bench_find_principals(c: &mut Criterion) {
    let (service, path) = setup(true);
    let acm = service.manager(Principal::admin());
    c.bench_function("find_principals", |b| {
        b.iter(|| {
            acm.find_principals(ZONE_CONTENT, black_box(&path), Permission::CAN_READ, true)
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_can, bench_find_principals);
criterion_main!(benches);
