use super::*;
use crate::config::WorldConfig;
use crate::distributions::Distribution;
use crate::tensor::{Tensor, TensorError};
use indexmap::IndexSet;

fn lp(d: Distribution, x: f64) -> f64 { d.log_prob(&Tensor::scalar(x)) }

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
}

fn seeded() -> World { World::new(WorldConfig { seed: Some(7), ..WorldConfig::default() }) }

fn ids(nodes: &[&RVIdentifier]) -> IndexSet<RVIdentifier> { nodes.iter().map(|n| (*n).clone()).collect() }

/// Puts a committed variable straight into the world.
fn commit(world: &mut World, node: &RVIdentifier, d: Distribution, value: f64, parents: &[&RVIdentifier], children: &[&RVIdentifier]) {
    let mut var = Variable::new(d, Tensor::scalar(value), ids(parents), false);
    var.children = ids(children);
    world.variables_mut().add_node(node.clone(), var);
}

fn standard_normal(name: &str) -> RandomVariable {
    RandomVariable::new(name, |_, _| Ok(Distribution::normal(0.0, 1.0)))
}

fn node<'w>(world: &'w World, id: &RVIdentifier) -> &'w Variable { world.get_node_in_world_raise_error(id).unwrap() }

/// `foo ~ N(0, 1)`, `bar ~ N(foo, 1)`, and `bar` is observed at 0.1.
fn foo_bar_world() -> (World, RVIdentifier, RVIdentifier) {
    let foo = standard_normal("foo");
    let foo_c = foo.clone();
    let bar = RandomVariable::new("bar", move |s, _| Ok(Distribution::normal(s.value(&foo_c.id())?, 1.0)));
    let (foo, bar) = (foo.id(), bar.id());

    let mut world = seeded();
    commit(&mut world, &foo, Distribution::normal(0.0, 1.0), 0.5, &[], &[&bar]);
    commit(&mut world, &bar, Distribution::normal(0.5, 1.0), 0.1, &[&foo], &[]);
    world.set_observations([(bar.clone(), Tensor::scalar(0.1))]);
    (world, foo, bar)
}

#[test]
fn test_world_change() {
    let (mut world, foo, bar) = foo_bar_world();
    let outcome = world.propose_change(&foo, Tensor::scalar(0.25)).unwrap();

    let node_update = lp(Distribution::normal(0.0, 1.0), 0.25) - lp(Distribution::normal(0.0, 1.0), 0.5);
    let children_update = lp(Distribution::normal(0.25, 1.0), 0.1) - lp(Distribution::normal(0.5, 1.0), 0.1);
    assert_close(outcome.node_log_update, node_update);
    assert_close(outcome.children_log_update, children_update);
    assert_close(outcome.world_log_update, node_update + children_update);
    assert_close(outcome.graph_log_update, 0.0);
    assert_eq!(outcome.as_tuple(), (outcome.children_log_update, outcome.world_log_update, outcome.node_log_update, outcome.score));
    assert_close(
        outcome.score,
        lp(Distribution::normal(0.0, 1.0), 0.25) + lp(Distribution::normal(0.25, 1.0), 0.1),
    );

    assert_eq!(world.diff().get_node(&foo).unwrap().value, Tensor::scalar(0.25));
    assert_eq!(world.diff().get_node(&bar).unwrap().distribution, Distribution::normal(0.25, 1.0));
    // Committed state is untouched until accept
    assert_eq!(world.variables().get_node(&foo).unwrap().value, Tensor::scalar(0.5));

    assert!(world.get_markov_blanket(&bar).unwrap().is_empty());
    assert!(world.get_markov_blanket(&foo).unwrap().is_empty());
}

#[test]
fn test_world_change_with_parent_update_and_new_node() {
    let foo = standard_normal("foo");
    let baz = standard_normal("baz");
    let (foo_c, baz_c) = (foo.clone(), baz.clone());
    let bar = RandomVariable::new("bar", move |s, _| {
        let mu = s.value(&foo_c.id())?;
        if mu < 0.3 {
            Ok(Distribution::normal(mu + s.value(&baz_c.id())?, 1.0))
        } else {
            Ok(Distribution::normal(mu, 1.0))
        }
    });
    let (foo, baz, bar) = (foo.id(), baz.id(), bar.id());

    let mut world = seeded();
    commit(&mut world, &foo, Distribution::normal(0.0, 1.0), 0.5, &[], &[&bar]);
    commit(&mut world, &bar, Distribution::normal(0.5, 1.0), 0.1, &[&foo], &[]);
    world.set_observations([(bar.clone(), Tensor::scalar(0.1))]);

    let outcome = world.propose_change(&foo, Tensor::scalar(0.25)).unwrap();

    assert_eq!(node(&world, &bar).parent, ids(&[&foo, &baz]));
    assert_eq!(node(&world, &baz).children, ids(&[&bar]));
    assert!(world.diff().contains_node(&baz));
    assert!(!world.variables().contains_node(&baz));

    let baz_value = node(&world, &baz).value.item().unwrap();
    let children_update =
        lp(Distribution::normal(0.25 + baz_value, 1.0), 0.1) - lp(Distribution::normal(0.5, 1.0), 0.1);
    assert_close(outcome.children_log_update, children_update);
    assert_close(outcome.world_log_update, children_update + outcome.node_log_update);
    assert_close(outcome.graph_log_update, node(&world, &baz).log_prob);
    // The blanket follows committed edges only, so baz joins it once accepted
    assert!(world.get_markov_blanket(&foo).unwrap().is_empty());
    world.accept_diff();
    assert_eq!(world.get_markov_blanket(&foo).unwrap(), ids(&[&baz]));
}

/// `bar`'s parents depend on which band `foo` falls in.
struct BandedModel {
    foo: RVIdentifier,
    baz: RVIdentifier,
    foobar: RVIdentifier,
    foobaz: RVIdentifier,
    bar: RVIdentifier,
}

fn banded_model() -> BandedModel {
    let foo = standard_normal("foo");
    let baz = standard_normal("baz");
    let f = foo.clone();
    let foobar = RandomVariable::new("foobar", move |s, _| {
        let mu = s.value(&f.id())?;
        Ok(if mu < 1.0 { Distribution::normal(mu, 1.0) } else { Distribution::normal(0.0, 1.0) })
    });
    let (f, fb) = (foo.clone(), foobar.clone());
    let foobaz = RandomVariable::new("foobaz", move |s, _| {
        if s.value(&f.id())? < 1.0 {
            Ok(Distribution::normal(s.value(&fb.id())?, 1.0))
        } else {
            Ok(Distribution::normal(0.0, 1.0))
        }
    });
    let (f, b, fb, fz) = (foo.clone(), baz.clone(), foobar.clone(), foobaz.clone());
    let bar = RandomVariable::new("bar", move |s, _| {
        let mu = s.value(&f.id())?;
        let shift = if mu < 0.3 {
            0.0
        } else if mu < 0.5 {
            s.value(&b.id())?
        } else if mu < 0.7 {
            s.value(&fb.id())?
        } else {
            s.value(&fz.id())?
        };
        Ok(Distribution::normal(mu + shift, 1.0))
    });
    BandedModel { foo: foo.id(), baz: baz.id(), foobar: foobar.id(), foobaz: foobaz.id(), bar: bar.id() }
}

#[test]
fn test_world_change_with_multiple_parent_updates() {
    let m = banded_model();
    let mut world = seeded();
    commit(&mut world, &m.foo, Distribution::normal(0.0, 1.0), 0.25, &[], &[&m.bar]);
    commit(&mut world, &m.bar, Distribution::normal(0.25, 1.0), 0.1, &[&m.foo], &[]);
    world.set_observations([(m.bar.clone(), Tensor::scalar(0.1))]);

    // 1. baz becomes a parent of bar
    let outcome = world.propose_change(&m.foo, Tensor::scalar(0.35)).unwrap();
    assert_close(outcome.graph_log_update, node(&world, &m.baz).log_prob);
    world.accept_diff();
    assert_eq!(world.variables().get_node(&m.bar).unwrap().parent, ids(&[&m.foo, &m.baz]));

    // 2. foobar replaces baz, which is left without children
    let baz_log_prob = world.variables().get_node(&m.baz).unwrap().log_prob;
    let old_foo = world.variables().get_node(&m.foo).unwrap().log_prob;
    let outcome = world.propose_change(&m.foo, Tensor::scalar(0.55)).unwrap();
    assert_close(outcome.node_log_update, lp(Distribution::normal(0.0, 1.0), 0.55) - old_foo);
    assert!(world.diff().is_marked_for_delete(&m.baz));
    assert_eq!(world.diff().to_be_deleted_vars().collect::<Vec<_>>(), vec![&m.baz]);
    assert_close(outcome.graph_log_update, node(&world, &m.foobar).log_prob - baz_log_prob);
    world.accept_diff();
    assert!(!world.variables().contains_node(&m.baz));
    assert!(!world.variables().get_node(&m.foo).unwrap().children.contains(&m.baz));
    assert_eq!(world.variables().get_node(&m.foo).unwrap().children, ids(&[&m.bar, &m.foobar]));

    // 3. foobaz replaces foobar as bar's parent, but foobar still feeds foobaz
    let outcome = world.propose_change(&m.foo, Tensor::scalar(0.75)).unwrap();
    assert!(world.diff().to_be_deleted_vars().next().is_none());
    assert_close(outcome.graph_log_update, node(&world, &m.foobaz).log_prob);
    world.accept_diff();
    let vars = world.variables();
    assert!(vars.contains_node(&m.foobar));
    assert!(!vars.get_node(&m.bar).unwrap().parent.contains(&m.foobar));
    assert_eq!(vars.get_node(&m.foobar).unwrap().children, ids(&[&m.foobaz]));
    assert_eq!(vars.get_node(&m.foobaz).unwrap().parent, ids(&[&m.foo, &m.foobar]));

    // 4. foobaz stops reading foobar, which is then deleted
    let foobar_log_prob = world.variables().get_node(&m.foobar).unwrap().log_prob;
    let outcome = world.propose_change(&m.foo, Tensor::scalar(1.05)).unwrap();
    assert!(world.diff().is_marked_for_delete(&m.foobar));
    assert_close(outcome.graph_log_update, -foobar_log_prob);
    world.accept_diff();
    let vars = world.variables();
    assert!(!vars.contains_node(&m.foobar));
    assert_eq!(vars.get_node(&m.foo).unwrap().children, ids(&[&m.bar, &m.foobaz]));
    assert_eq!(vars.get_node(&m.foobaz).unwrap().parent, ids(&[&m.foo]));
    assert_eq!(vars.len(), 3);
}

#[test]
fn test_ancestor_change_deletes_whole_branch() {
    let x = RandomVariable::new("X", |_, _| Ok(Distribution::categorical(vec![0.5, 0.5])));
    let a = standard_normal("A");
    let a_c = a.clone();
    let b = RandomVariable::new("B", move |s, args| {
        Ok(Distribution::normal(s.value(&a_c.call(args.to_vec()))?, 1.0))
    });
    let b_c = b.clone();
    let c = RandomVariable::new("C", move |s, args| {
        Ok(Distribution::normal(s.value(&b_c.call(args.to_vec()))?, 1.0))
    });
    let (b_c, c_c) = (b.clone(), c.clone());
    let d = RandomVariable::new("D", move |s, args| {
        let loc = s.value(&b_c.call(args.to_vec()))?;
        let scale = s.value(&c_c.call(args.to_vec()))?.abs() + 0.1;
        Ok(Distribution::normal(loc, scale))
    });
    let (x_c, d_c) = (x.clone(), d.clone());
    let y = RandomVariable::new("Y", move |s, _| {
        let i = s.value(&x_c.id())?;
        Ok(Distribution::normal(s.value(&d_c.with_arg(i))?, 1.0))
    });

    let mut world = seeded();
    world.set_observations([(y.id(), Tensor::scalar(1.0))]);
    world.update_graph(&x.id()).unwrap();
    world.accept_diff();
    world.variables_mut().get_node_mut(&x.id()).unwrap().update_value(Tensor::scalar(0.0));
    world.update_graph(&y.id()).unwrap();
    world.accept_diff();

    let old: Vec<RVIdentifier> = [&a, &b, &c, &d].iter().map(|rv| rv.with_arg(0.0)).collect();
    let new: Vec<RVIdentifier> = [&a, &b, &c, &d].iter().map(|rv| rv.with_arg(1.0)).collect();
    let old_log_prob: f64 = old.iter().map(|n| world.variables().get_node(n).unwrap().log_prob).sum();

    let outcome = world.propose_change(&x.id(), Tensor::scalar(1.0)).unwrap();

    let marked: IndexSet<RVIdentifier> = world.diff().to_be_deleted_vars().cloned().collect();
    assert_eq!(marked, old.iter().cloned().collect::<IndexSet<_>>());
    for n in &new {
        assert!(world.diff().contains_node(n));
        assert!(!world.diff().is_marked_for_delete(n));
    }
    let new_log_prob: f64 = new.iter().map(|n| node(&world, n).log_prob).sum();

    assert_close(outcome.node_log_update, 0.0);
    assert_close(outcome.world_log_update, outcome.children_log_update);
    assert_close(outcome.graph_log_update, new_log_prob - old_log_prob);

    world.accept_diff();
    for n in &old {
        assert!(!world.variables().contains_node(n));
    }
    assert_eq!(world.variables().get_node(&y.id()).unwrap().parent, ids(&[&x.id(), &new[3]]));
}

#[test]
fn test_node_read_again_is_revived() {
    let foo = standard_normal("foo");
    let baz = standard_normal("baz");
    let (f, b) = (foo.clone(), baz.clone());
    let bar = RandomVariable::new("bar", move |s, _| {
        let mu = s.value(&f.id())?;
        let shift = if mu < 0.0 { s.value(&b.id())? } else { 0.0 };
        Ok(Distribution::normal(mu + shift, 1.0))
    });
    let (f, b) = (foo.clone(), baz.clone());
    let qux = RandomVariable::new("qux", move |s, _| {
        let mu = s.value(&f.id())?;
        let shift = if mu >= 0.0 { s.value(&b.id())? } else { 0.0 };
        Ok(Distribution::normal(mu + shift, 1.0))
    });
    let (foo, baz, bar, qux) = (foo.id(), baz.id(), bar.id(), qux.id());

    let mut world = seeded();
    world.update_graph(&foo).unwrap();
    world.accept_diff();
    world.variables_mut().get_node_mut(&foo).unwrap().update_value(Tensor::scalar(-1.0));
    world.update_graph(&bar).unwrap();
    world.update_graph(&qux).unwrap();
    world.accept_diff();
    assert_eq!(world.variables().get_node(&baz).unwrap().children, ids(&[&bar]));

    // bar drops baz before qux picks it up again
    let outcome = world.propose_change(&foo, Tensor::scalar(1.0)).unwrap();
    assert!(world.diff().to_be_deleted_vars().next().is_none());
    assert_close(outcome.graph_log_update, 0.0);

    world.accept_diff();
    assert_eq!(world.variables().get_node(&baz).unwrap().children, ids(&[&qux]));
    assert_eq!(world.variables().get_node(&qux).unwrap().parent, ids(&[&foo, &baz]));
}

#[test]
fn test_update_graph_small_bar() {
    let foo = standard_normal("foo");
    let f = foo.clone();
    let bar = RandomVariable::new("bar", move |s, _| Ok(Distribution::normal(s.value(&f.id())?, 1.0)));
    let (foo, bar) = (foo.id(), bar.id());

    let mut world = seeded();
    let value = world.update_graph(&bar).unwrap();
    assert_eq!(node(&world, &bar).value, value);
    assert_eq!(node(&world, &bar).parent, ids(&[&foo]));
    assert_eq!(node(&world, &foo).children, ids(&[&bar]));
    assert_eq!(world.diff().len(), 2);
    assert!(world.variables().is_empty());

    world.accept_diff();
    assert_eq!(world.variables().len(), 2);
    assert!(world.diff().is_empty());
    let foo_value = world.variables().get_node(&foo).unwrap().value.item().unwrap();
    assert_eq!(world.variables().get_node(&bar).unwrap().distribution, Distribution::normal(foo_value, 1.0));
}

#[test]
fn test_diff_holds_only_changed_nodes() {
    let foo = standard_normal("foo");
    let baz = standard_normal("baz");
    let (f, b) = (foo.clone(), baz.clone());
    let bar = RandomVariable::new("bar", move |s, _| Ok(Distribution::normal(s.value(&f.id())? + s.value(&b.id())?, 1.0)));
    let (foo, baz, bar) = (foo.id(), baz.id(), bar.id());

    let mut world = seeded();
    world.update_graph(&bar).unwrap();
    world.accept_diff();

    world.propose_change(&foo, Tensor::scalar(0.3)).unwrap();
    let staged: Vec<&RVIdentifier> = world.diff().vars().keys().collect();
    assert_eq!(staged, vec![&foo, &bar]);
    assert!(!world.diff().contains_node(&baz));
    assert_eq!(node(&world, &bar).parent, ids(&[&foo, &baz]));
}

#[test]
fn test_update_graph_small_foo() {
    let foo = standard_normal("foo").id();
    let mut world = seeded();
    world.update_graph(&foo).unwrap();
    let var = node(&world, &foo);
    assert!(var.parent.is_empty());
    assert!(var.children.is_empty());
    assert_close(var.log_prob, Distribution::normal(0.0, 1.0).log_prob(&var.value));
}

#[test]
fn test_update_graph_parent_update() {
    let foo = standard_normal("foo");
    let baz = standard_normal("baz");
    let (f, b) = (foo.clone(), baz.clone());
    let bar = RandomVariable::new("bar", move |s, _| {
        let mu = s.value(&f.id())?;
        let shift = if mu < 0.3 { s.value(&b.id())? } else { 0.0 };
        Ok(Distribution::normal(mu + shift, 1.0))
    });
    let (foo, baz, bar) = (foo.id(), baz.id(), bar.id());

    let mut world = seeded();
    world.update_graph(&foo).unwrap();
    world.update_graph(&bar).unwrap();
    world.update_graph(&baz).unwrap();
    world.accept_diff();

    world.propose_change(&foo, Tensor::scalar(0.8)).unwrap();
    world.accept_diff();
    assert_eq!(world.variables().get_node(&bar).unwrap().parent, ids(&[&foo]));
    assert_eq!(world.variables().get_node(&foo).unwrap().children, ids(&[&bar]));

    world.propose_change(&foo, Tensor::scalar(0.2)).unwrap();
    world.accept_diff();
    let vars = world.variables();
    assert_eq!(vars.get_node(&bar).unwrap().parent, ids(&[&foo, &baz]));
    assert_eq!(vars.get_node(&baz).unwrap().children, ids(&[&bar]));
    assert!(vars.get_node(&baz).unwrap().parent.is_empty());
}

#[test]
fn test_reject_diff_restores_committed_view() {
    let (mut world, foo, bar) = foo_bar_world();
    let before = world.joint_log_prob();
    let snapshot = world.variables().vars().clone();
    world.propose_change(&foo, Tensor::scalar(2.0)).unwrap();
    assert!(!world.diff().is_empty());

    world.reject_diff();
    assert!(world.diff().is_empty());
    assert_eq!(node(&world, &foo).value, Tensor::scalar(0.5));
    assert_eq!(node(&world, &bar).distribution, Distribution::normal(0.5, 1.0));
    assert_eq!(world.variables().vars(), &snapshot);
    assert_eq!(world.joint_log_prob(), before);
}

#[test]
fn test_get_node_in_world_raise_error() {
    let world = seeded();
    let missing = standard_normal("missing").id();
    assert!(world.get_node_in_world(&missing).is_none());
    assert_eq!(world.get_node_in_world_raise_error(&missing).unwrap_err(), WorldError::NotFound { node: missing });
}

#[test]
fn test_compute_score() {
    let (world, foo, _) = foo_bar_world();
    let score = world.compute_score(node(&world, &foo)).unwrap();
    assert_close(score, lp(Distribution::normal(0.0, 1.0), 0.5) + lp(Distribution::normal(0.5, 1.0), 0.1));

    let mut orphan = node(&world, &foo).clone();
    orphan.children.insert(standard_normal("ghost").id());
    assert!(matches!(world.compute_score(&orphan), Err(WorldError::InconsistentVariable { .. })));
}

#[test]
fn test_compute_score_includes_jacobian() {
    let scale = RandomVariable::new("scale", |_, _| Ok(Distribution::half_normal(1.0))).id();
    let mut world = World::new(WorldConfig { seed: Some(3), transform_constrained: true, ..WorldConfig::default() });
    world.update_graph(&scale).unwrap();
    let var = node(&world, &scale);
    assert_eq!(var.transforms, vec![Transform::Log]);
    assert_close(world.compute_score(var).unwrap(), var.log_prob + var.jacobian);
}

#[test]
fn test_proposals_on_fixed_nodes_fail() {
    let (mut world, foo, bar) = foo_bar_world();
    assert_eq!(
        world.propose_change(&bar, Tensor::scalar(0.0)).unwrap_err(),
        WorldError::ObservedNode { node: bar.clone() }
    );
    let missing = standard_normal("missing").id();
    assert!(matches!(world.propose_change(&missing, Tensor::scalar(0.0)), Err(WorldError::NotFound { .. })));
    // The failed proposals leave the world usable
    assert!(world.propose_change(&foo, Tensor::scalar(0.1)).is_ok());
}

#[test]
fn test_proposal_on_marked_node_fails() {
    let m = banded_model();
    let mut world = seeded();
    commit(&mut world, &m.foo, Distribution::normal(0.0, 1.0), 0.35, &[], &[&m.bar]);
    commit(&mut world, &m.baz, Distribution::normal(0.0, 1.0), 0.0, &[], &[&m.bar]);
    commit(&mut world, &m.bar, Distribution::normal(0.35, 1.0), 0.1, &[&m.foo, &m.baz], &[]);

    world.propose_change(&m.foo, Tensor::scalar(0.1)).unwrap();
    assert!(world.diff().is_marked_for_delete(&m.baz));
    assert_eq!(
        world.propose_change(&m.baz, Tensor::scalar(1.0)).unwrap_err(),
        WorldError::MarkedForDelete { node: m.baz.clone() }
    );
}

#[test]
fn test_queried_parent_is_kept() {
    let m = banded_model();
    let mut world = seeded();
    commit(&mut world, &m.foo, Distribution::normal(0.0, 1.0), 0.35, &[], &[&m.bar]);
    commit(&mut world, &m.baz, Distribution::normal(0.0, 1.0), 0.0, &[], &[&m.bar]);
    commit(&mut world, &m.bar, Distribution::normal(0.35, 1.0), 0.1, &[&m.foo, &m.baz], &[]);
    world.set_queries([m.baz.clone()]);

    world.propose_change(&m.foo, Tensor::scalar(0.1)).unwrap();
    assert!(!world.diff().is_marked_for_delete(&m.baz));
    assert!(node(&world, &m.baz).children.is_empty());
}

fn chain() -> RandomVariable {
    RandomVariable::new("chain", |s, args| {
        let i = args.first().and_then(ArgValue::as_f64).unwrap_or(0.0);
        Ok(Distribution::normal(s.value(&chain().with_arg(i + 1.0))?, 1.0))
    })
}

#[test]
fn test_unbounded_recursion_is_cut_off() {
    let mut world = World::new(WorldConfig { seed: Some(1), max_depth: 16, ..WorldConfig::default() });
    let err = world.update_graph(&chain().with_arg(0.0)).unwrap_err();
    assert!(matches!(err, WorldError::RecursionLimit { depth: 16, .. }));
    assert!(world.diff().is_empty());
}

#[test]
fn test_self_dependency_is_cyclic() {
    let this = standard_normal("loop");
    let looped = RandomVariable::new("loop", move |s, _| Ok(Distribution::normal(s.value(&this.id())?, 1.0)));
    let mut world = seeded();
    assert!(matches!(world.update_graph(&looped.id()), Err(WorldError::CyclicDependency { .. })));
}

#[test]
fn test_distance_to_observation() {
    let (world, foo, bar) = foo_bar_world();
    assert_close(world.distance_to_observation(&bar, &Tensor::scalar(0.4)).unwrap(), 0.3);
    assert!(matches!(
        world.distance_to_observation(&bar, &Tensor::vector(vec![0.1, 0.1])),
        Err(WorldError::Tensor(TensorError::ShapeMismatch { .. }))
    ));
    assert_eq!(
        world.distance_to_observation(&foo, &Tensor::scalar(0.0)).unwrap_err(),
        WorldError::NotObserved { node: foo }
    );
}

#[test]
fn test_seeded_worlds_agree() {
    let foo = standard_normal("foo").id();
    let mut first = seeded();
    let mut second = seeded();
    assert_eq!(first.update_graph(&foo).unwrap(), second.update_graph(&foo).unwrap());
}
