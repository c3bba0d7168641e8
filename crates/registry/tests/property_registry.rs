use moniker_registry::{Registry, RegistryConfig, RegistryError, SequenceEntropy};
use moniker_signer::{CapabilitySigner, SigningDomain};
use moniker_types::{Address, DomainKey, Label, Nonce, Partition, WordCorpus};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

// Property-based checks over arbitrary operation sequences.
// Quota, uniqueness and owner-set consistency must hold after every step.

#[derive(Debug, Clone)]
enum Op {
    Signed {
        owner: u8,
        adjective: usize,
        descriptor: usize,
        noun: usize,
        partition: usize,
        nonce: u8,
    },
    Random {
        owner: u8,
        partition: usize,
    },
    Transfer {
        from: u8,
        to: u8,
        pick: usize,
    },
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u8..=4, 0usize..3, 0usize..3, 0usize..3, 0usize..2, any::<u8>()).prop_map(
            |(owner, adjective, descriptor, noun, partition, nonce)| Op::Signed {
                owner,
                adjective,
                descriptor,
                noun,
                partition,
                nonce,
            }
        ),
        (1u8..=4, 0usize..2).prop_map(|(owner, partition)| Op::Random { owner, partition }),
        (1u8..=4, 1u8..=4, any::<usize>()).prop_map(|(from, to, pick)| Op::Transfer {
            from,
            to,
            pick
        }),
    ]
}

fn setup(seed: Vec<u64>) -> (Registry, CapabilitySigner) {
    let mut config = RegistryConfig::new(Address([0xEE; 20]), Address([0xAD; 20]));
    config.registration_fee = 0;
    config.max_domains_per_user = 3;
    let signer = CapabilitySigner::new([42u8; 32], SigningDomain::for_target(config.address));
    let corpus = WordCorpus::new(
        vec!["amber".into(), "brisk".into(), "coral".into()],
        vec!["quiet".into(), "rapid".into(), "stark".into()],
        vec!["heron".into(), "ibis".into(), "jay".into()],
        vec![
            Partition::new("Base").unwrap(),
            Partition::new("OP").unwrap(),
        ],
    )
    .unwrap();
    let registry = Registry::in_memory(config, signer.verifier(), corpus)
        .unwrap()
        .with_entropy(Arc::new(SequenceEntropy::new(seed)));
    (registry, signer)
}

fn apply(registry: &Registry, signer: &CapabilitySigner, op: &Op) {
    let corpus = registry.components();
    match *op {
        Op::Signed {
            owner,
            adjective,
            descriptor,
            noun,
            partition,
            nonce,
        } => {
            let owner = Address([owner; 20]);
            let label = Label::compose(
                &corpus.adjectives[adjective],
                &corpus.descriptors[descriptor],
                &corpus.nouns[noun],
            )
            .unwrap();
            let key = DomainKey::new(corpus.partitions[partition].clone(), label);
            let auth = signer.sign_with(&owner, &key, u64::MAX, Nonce([nonce; 32]));
            let _ = registry.register(&owner, &key.partition, &key.label, &auth, 0);
        }
        Op::Random { owner, partition } => {
            let _ = registry.register_random(&Address([owner; 20]), partition, 0);
        }
        Op::Transfer { from, to, pick } => {
            let from = Address([from; 20]);
            let owned = registry.owned_labels(&from);
            if owned.is_empty() {
                return;
            }
            let key = &owned[pick % owned.len()];
            let _ = registry.transfer_domain(&from, &key.partition, &key.label, &Address([to; 20]));
        }
    }
}

fn owners() -> Vec<Address> {
    (1u8..=4).map(|b| Address([b; 20])).collect()
}

proptest! {
    #[test]
    fn owner_sets_partition_the_records(
        ops in prop::collection::vec(arbitrary_op(), 1..60),
        seed in prop::collection::vec(any::<u64>(), 1..8),
    ) {
        let (registry, signer) = setup(seed);
        for op in &ops {
            apply(&registry, &signer, op);

            let mut seen = HashSet::new();
            let mut total = 0;
            for owner in owners() {
                let labels = registry.owned_labels(&owner);
                prop_assert_eq!(labels.len(), registry.domain_count(&owner));
                for key in labels {
                    let record = registry.get_record(&key.partition, &key.label);
                    prop_assert!(record.is_some());
                    prop_assert_eq!(record.map(|r| r.owner), Some(owner));
                    prop_assert!(seen.insert(key));
                    total += 1;
                }
            }
            prop_assert_eq!(total, registry.record_count());
        }
    }

    #[test]
    fn nonces_are_single_use(nonce in any::<u8>(), owner in 1u8..=4) {
        let (registry, signer) = setup(vec![0]);
        let corpus = registry.components();
        let owner = Address([owner; 20]);
        let first = DomainKey::new(
            corpus.partitions[0].clone(),
            corpus.label_at(0, 0, 0).unwrap().unwrap(),
        );
        let auth = signer.sign_with(&owner, &first, u64::MAX, Nonce([nonce; 32]));
        prop_assert!(registry.register(&owner, &first.partition, &first.label, &auth, 0).is_ok());

        let replay = registry.register(&owner, &first.partition, &first.label, &auth, 0);
        prop_assert!(matches!(replay, Err(RegistryError::ReplayedAuthorization)));
        prop_assert_eq!(registry.record_count(), 1);
    }
}

proptest! {
    #[test]
    fn creation_never_exceeds_quota(
        ops in prop::collection::vec(arbitrary_op(), 1..60),
    ) {
        let (registry, signer) = setup(vec![1, 2, 3, 4, 5, 6, 7]);
        let creations_only = ops.iter().filter(|op| !matches!(op, Op::Transfer { .. }));
        for op in creations_only {
            apply(&registry, &signer, op);
            for owner in owners() {
                prop_assert!(registry.domain_count(&owner) <= 3);
            }
        }
    }
}
