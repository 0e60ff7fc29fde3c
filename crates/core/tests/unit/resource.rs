//! Resource reservation tests.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use tibbar_core::resource::{
    AllocatedClaim, Reserver, ResourceId, ResourceIdent, ResourceRequest, ResourceRequests,
    ResourceSlot, ResourceSpace,
};

fn gpr_space(range: std::ops::Range<u32>) -> ResourceSpace {
    let mut pools = BTreeMap::new();
    let _ = pools.insert(
        "GPR".to_owned(),
        range.map(ResourceIdent::Index).collect::<Vec<_>>(),
    );
    ResourceSpace::from_pools(pools)
}

fn exclusive_ids(ids: &[ResourceId]) -> ResourceRequests {
    ResourceRequests {
        exclusive: ids.iter().cloned().map(ResourceRequest::Id).collect(),
        shared: Vec::new(),
    }
}

#[test]
fn space_builds_resource_ids_from_pools() {
    let mut pools = BTreeMap::new();
    let _ = pools.insert(
        "GPR".to_owned(),
        (0..4).map(ResourceIdent::Index).collect::<Vec<_>>(),
    );
    let _ = pools.insert(
        "CSR".to_owned(),
        vec![
            ResourceIdent::Name("mstatus".to_owned()),
            ResourceIdent::Name("mie".to_owned()),
        ],
    );
    let space = ResourceSpace::from_pools(pools);
    let all = space.all_resources();
    assert!(all.contains(&ResourceId::indexed("GPR", 0)));
    assert!(all.contains(&ResourceId::indexed("GPR", 3)));
    assert!(all.contains(&ResourceId::named("CSR", "mstatus")));
    assert!(all.contains(&ResourceId::named("CSR", "mie")));
    assert_eq!(all.len(), 6);
}

#[test]
fn exclusive_allocation_and_release() {
    let mut reserver = Reserver::new(gpr_space(1..5));
    let claim = reserver
        .request(
            1,
            &exclusive_ids(&[ResourceId::indexed("GPR", 1), ResourceId::indexed("GPR", 2)]),
        )
        .expect("valid request")
        .expect("grant");
    assert_eq!(claim.exclusive.len(), 2);
    assert!(claim.exclusive.contains(&ResourceId::indexed("GPR", 1)));

    reserver.release(1);
    let again = reserver
        .request(2, &exclusive_ids(&[ResourceId::indexed("GPR", 1)]))
        .expect("valid request");
    assert!(again.is_some());
}

#[test]
fn exclusive_conflict_returns_none() {
    let mut reserver = Reserver::new(gpr_space(1..5));
    let _ = reserver
        .request(1, &exclusive_ids(&[ResourceId::indexed("GPR", 1)]))
        .expect("valid")
        .expect("grant");
    let conflict = reserver
        .request(2, &exclusive_ids(&[ResourceId::indexed("GPR", 1)]))
        .expect("valid request shape");
    assert_eq!(conflict, None);
}

#[test]
fn slot_allocation_picks_concrete_resources() {
    let mut reserver = Reserver::new(gpr_space(0..4));
    let requests = ResourceRequests {
        exclusive: vec![ResourceRequest::Slot(ResourceSlot::new("GPR", 2))],
        shared: Vec::new(),
    };
    let claim = reserver.request(1, &requests).expect("valid").expect("grant");
    assert_eq!(claim.exclusive.len(), 2);
    assert!(claim.exclusive.iter().all(|r| r.namespace == "GPR"));
}

#[test]
fn slot_allocation_is_deterministic() {
    let claims: Vec<AllocatedClaim> = (0..2)
        .map(|_| {
            let mut reserver = Reserver::new(gpr_space(1..9));
            let requests = ResourceRequests {
                exclusive: vec![ResourceRequest::Slot(ResourceSlot::new("GPR", 3))],
                shared: Vec::new(),
            };
            reserver.request(1, &requests).expect("valid").expect("grant")
        })
        .collect();
    assert_eq!(claims[0], claims[1]);
}

#[test]
fn zero_register_request_is_a_hard_error() {
    let mut reserver = Reserver::new(gpr_space(1..8));
    let err = reserver
        .request(1, &exclusive_ids(&[ResourceId::indexed("GPR", 0)]))
        .expect_err("the zero register is never reservable");
    assert!(err.to_string().contains("zero register"));

    let shared = ResourceRequests {
        exclusive: Vec::new(),
        shared: vec![ResourceRequest::Id(ResourceId::indexed("GPR", 0))],
    };
    assert!(reserver.request(1, &shared).is_err());
}

#[test]
fn unknown_namespace_slot_is_a_hard_error() {
    let mut reserver = Reserver::new(gpr_space(1..8));
    let requests = ResourceRequests {
        exclusive: vec![ResourceRequest::Slot(ResourceSlot::new("VEC", 1))],
        shared: Vec::new(),
    };
    assert!(reserver.request(1, &requests).is_err());
}

#[test]
fn shared_holds_block_exclusive_claims() {
    let mut reserver = Reserver::new(gpr_space(1..5));
    let shared = ResourceRequests {
        exclusive: Vec::new(),
        shared: vec![ResourceRequest::Id(ResourceId::indexed("GPR", 1))],
    };
    let granted = reserver.request(1, &shared).expect("valid");
    assert!(granted.is_some());

    let blocked = reserver
        .request(2, &exclusive_ids(&[ResourceId::indexed("GPR", 1)]))
        .expect("valid");
    assert_eq!(blocked, None);

    reserver.release(1);
    let after = reserver
        .request(2, &exclusive_ids(&[ResourceId::indexed("GPR", 1)]))
        .expect("valid");
    assert!(after.is_some());
}

#[test]
fn two_shared_holders_coexist() {
    let mut reserver = Reserver::new(gpr_space(1..5));
    let shared = ResourceRequests {
        exclusive: Vec::new(),
        shared: vec![ResourceRequest::Id(ResourceId::indexed("GPR", 2))],
    };
    assert!(reserver.request(1, &shared).expect("valid").is_some());
    assert!(reserver.request(2, &shared).expect("valid").is_some());

    // The resource only returns to the pool after both release.
    reserver.release(1);
    let exclusive = exclusive_ids(&[ResourceId::indexed("GPR", 2)]);
    assert_eq!(reserver.request(3, &exclusive).expect("valid"), None);
    reserver.release(2);
    assert!(reserver.request(3, &exclusive).expect("valid").is_some());
}

#[test]
fn duplicate_exclusive_id_fails_without_partial_commit() {
    let mut reserver = Reserver::new(gpr_space(1..5));
    let requests = exclusive_ids(&[
        ResourceId::indexed("GPR", 3),
        ResourceId::indexed("GPR", 3),
    ]);
    assert_eq!(reserver.request(1, &requests).expect("valid shape"), None);
    // Nothing was committed: the id is still free.
    assert!(reserver
        .request(2, &exclusive_ids(&[ResourceId::indexed("GPR", 3)]))
        .expect("valid")
        .is_some());
}

#[test]
fn second_request_by_the_same_sequence_is_rejected() {
    let mut reserver = Reserver::new(gpr_space(1..5));
    assert!(reserver
        .request(7, &exclusive_ids(&[ResourceId::indexed("GPR", 1)]))
        .expect("valid")
        .is_some());
    assert!(reserver.holds_anything(7));
    assert_eq!(
        reserver
            .request(7, &exclusive_ids(&[ResourceId::indexed("GPR", 2)]))
            .expect("valid"),
        None
    );
}
