//! Drive every registered model through the type-erased protocol
use conjugate::registry::{DynModel, Registry};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde_json::Value;

const DATA_COUNT: usize = 20;
const TOL: f64 = 1E-6;

fn for_each_example<F>(mut f: F)
where
    F: FnMut(&str, &dyn DynModel, &[Value]),
{
    let registry = Registry::builtin();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names.len(), 5);
    for name in names {
        let examples = registry.examples(name).unwrap();
        assert!(!examples.is_empty(), "{} has no examples", name);
        for example in examples {
            let model = registry.load_model(name, &example.model).unwrap();
            assert_eq!(model.name(), name);
            f(name, model.as_ref(), &example.values);
        }
    }
}

#[test]
fn interface() {
    let mut rng = Xoshiro256Plus::seed_from_u64(1);
    for_each_example(|name, model, values| {
        let mut group1 = model.group();
        let mut group2 = model.group();
        model.group_init(&mut group1).unwrap();
        model.group_init(&mut group2).unwrap();
        let empty = model.dump_group(&group2).unwrap();

        for x in values {
            model.group_add_value(&mut group1, x).unwrap();
            model.group_add_value(&mut group2, x).unwrap();
        }
        for x in values {
            model.group_remove_value(&mut group2, x).unwrap();
        }
        assert_eq!(model.dump_group(&group2).unwrap(), empty, "{}", name);

        model.group_merge(&mut group2, &group1).unwrap();
        let merged = model.dump_group(&group2).unwrap();
        let expected = model.dump_group(&group1).unwrap();
        conjugate::codec::check_close(&merged, &expected, 1E-9).unwrap();

        for x in values {
            assert!(model.score_value(&group1, x).unwrap().is_finite(), "{}", name);
        }
        for _ in 0..10 {
            let x = model.sample_value(&group1, &mut rng).unwrap();
            assert!(model.score_value(&group1, &x).unwrap().is_finite(), "{}", name);
            assert_eq!(model.sample_group(10, &mut rng).unwrap().len(), 10);
        }
        assert!(model.score_group(&group1).unwrap().is_finite());

        let reloaded = model.load_group(&expected).unwrap();
        assert_eq!(model.dump_group(&reloaded).unwrap(), expected);
    });
}

#[test]
fn chain_rule() {
    let mut rng = Xoshiro256Plus::seed_from_u64(2);
    for_each_example(|name, model, _| {
        let mut group = model.group();
        let mut score = 0.0;
        for _ in 0..DATA_COUNT {
            let x = model.sample_value(&group, &mut rng).unwrap();
            score += model.score_value(&group, &x).unwrap();
            model.group_add_value(&mut group, &x).unwrap();
        }
        let total = model.score_group(&group).unwrap();
        assert!((score - total).abs() < TOL, "{}: {} != {}", name, score, total);
    });
}

#[test]
fn add_remove_add() {
    let mut rng = Xoshiro256Plus::seed_from_u64(3);
    for_each_example(|name, model, _| {
        let mut group = model.group();
        let mut values = Vec::with_capacity(DATA_COUNT);
        for _ in 0..DATA_COUNT {
            let x = model.sample_value(&group, &mut rng).unwrap();
            model.group_add_value(&mut group, &x).unwrap();
            values.push(x);
        }
        let dump_all = model.dump_group(&group).unwrap();

        values.shuffle(&mut rng);
        for x in &values {
            model.group_remove_value(&mut group, x).unwrap();
        }
        let dump_empty = model.dump_group(&model.group()).unwrap();
        assert_eq!(model.dump_group(&group).unwrap(), dump_empty, "{}", name);

        values.shuffle(&mut rng);
        for x in &values {
            model.group_add_value(&mut group, x).unwrap();
        }
        let dump = model.dump_group(&group).unwrap();
        conjugate::codec::check_close(&dump, &dump_all, 1E-9)
            .unwrap_or_else(|err| panic!("{}: {}", name, err));
    });
}

#[test]
fn model_dump_round_trip() {
    let registry = Registry::builtin();
    for name in registry.names() {
        for example in registry.examples(name).unwrap() {
            let model = registry.load_model(name, &example.model).unwrap();
            assert_eq!(model.dump_model().unwrap(), example.model, "{}", name);
        }
    }
}

#[test]
fn groups_do_not_cross_models() {
    let registry = Registry::builtin();
    let names: Vec<&str> = registry.names().collect();
    for a in &names {
        for b in &names {
            if a == b {
                continue;
            }
            let ex_a = &registry.examples(a).unwrap()[0];
            let ex_b = &registry.examples(b).unwrap()[0];
            let model_a = registry.load_model(a, &ex_a.model).unwrap();
            let model_b = registry.load_model(b, &ex_b.model).unwrap();
            let group_b = model_b.group();
            assert!(model_a.score_group(&group_b).is_err(), "{} accepted {}", a, b);
        }
    }
}

#[test]
fn dd_groups_keep_their_dimension() {
    let registry = Registry::builtin();
    let small = registry
        .load_model("dd", &serde_json::json!({"alphas": [1.0, 1.0]}))
        .unwrap();
    let large = registry
        .load_model("dd", &serde_json::json!({"alphas": [1.0, 1.0, 1.0]}))
        .unwrap();

    let mut group_small = small.group();
    small
        .group_add_value(&mut group_small, &serde_json::json!(1))
        .unwrap();
    let mut group_large = large.group();
    large
        .group_add_value(&mut group_large, &serde_json::json!(2))
        .unwrap();

    assert!(large.score_group(&group_small).is_err());
    assert!(small.score_group(&group_large).is_err());
    let before = small.dump_group(&group_small).unwrap();
    assert!(small.group_merge(&mut group_small, &group_large).is_err());
    assert!(large.group_merge(&mut group_small, &group_large).is_err());
    assert_eq!(small.dump_group(&group_small).unwrap(), before);

    let params = serde_json::json!([[1.0, 1.0]]);
    assert!(registry.load_model("dd", &params).is_err());
}
