use ir::{Builder, Function, Type, TypeStore};

use super::*;

fn singleton(origin: SetOrigin) -> Sets {
    Sets::singleton(origin)
}

fn phi(a: SetOrigin, b: SetOrigin) -> Sets {
    let mut sets = Sets::singleton(a);
    sets.insert(b);
    sets
}

#[test]
fn testStraightLine() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![], vec![Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    let one = b.make_i32(1);
    let set = b.make_local_set(0, one);
    let get = b.make_local_get(0);
    let body = b.make_block(None, vec![set, get]);
    func.body = body;

    let graph = LocalGraph::compute(&func);
    assert_eq!(graph.get_setses[&get], singleton(SetOrigin::Set(set)));
    assert_eq!(graph.locations, vec![set, get]);
}

#[test]
fn testRedefinition() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![], vec![Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    let one = b.make_i32(1);
    let set1 = b.make_local_set(0, one);
    let two = b.make_i32(2);
    let set2 = b.make_local_set(0, two);
    let get = b.make_local_get(0);
    let body = b.make_block(None, vec![set1, set2, get]);
    func.body = body;

    let graph = LocalGraph::compute(&func);
    assert_eq!(graph.get_setses[&get], singleton(SetOrigin::Set(set2)));
}

#[test]
fn testEntryValues() {
    let types = TypeStore::new();
    // One parameter, one var, neither ever set: both reads see the entry
    // value.
    let mut func = Function::new("test", vec![Type::I32], vec![Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    let get_param = b.make_local_get(0);
    let drop_param = b.make_drop(get_param);
    let get_var = b.make_local_get(1);
    let drop_var = b.make_drop(get_var);
    let body = b.make_block(None, vec![drop_param, drop_var]);
    func.body = body;

    let graph = LocalGraph::compute(&func);
    assert_eq!(graph.get_setses[&get_param], singleton(SetOrigin::Entry));
    assert_eq!(graph.get_setses[&get_var], singleton(SetOrigin::Entry));
}

#[test]
fn testIfJoin() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![Type::I32], vec![Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    let cond = b.make_local_get(0);
    let one = b.make_i32(1);
    let set1 = b.make_local_set(1, one);
    let two = b.make_i32(2);
    let set2 = b.make_local_set(1, two);
    let if_ = b.make_if(cond, set1, Some(set2));
    let get = b.make_local_get(1);
    let drop = b.make_drop(get);
    let body = b.make_block(None, vec![if_, drop]);
    func.body = body;

    let graph = LocalGraph::compute(&func);
    assert_eq!(
        graph.get_setses[&get],
        phi(SetOrigin::Set(set1), SetOrigin::Set(set2))
    );
}

#[test]
fn testIfWithoutElseJoinsEntry() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![Type::I32], vec![Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    let cond = b.make_local_get(0);
    let one = b.make_i32(1);
    let set = b.make_local_set(1, one);
    let if_ = b.make_if(cond, set, None);
    let get = b.make_local_get(1);
    let drop = b.make_drop(get);
    let body = b.make_block(None, vec![if_, drop]);
    func.body = body;

    let graph = LocalGraph::compute(&func);
    assert_eq!(
        graph.get_setses[&get],
        phi(SetOrigin::Entry, SetOrigin::Set(set))
    );
}

#[test]
fn testLoopBackEdge() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![Type::I32], vec![Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    // loop $l { drop(x); x = 1; br_if (cond) $l }; drop(x)
    let get_in_loop = b.make_local_get(1);
    let drop_in_loop = b.make_drop(get_in_loop);
    let one = b.make_i32(1);
    let set = b.make_local_set(1, one);
    let cond = b.make_local_get(0);
    let br_if = b.make_br("l", Some(cond));
    let loop_body = b.make_block(None, vec![drop_in_loop, set, br_if]);
    let loop_ = b.make_loop(Some("l".into()), loop_body);
    let get_after = b.make_local_get(1);
    let drop_after = b.make_drop(get_after);
    let body = b.make_block(None, vec![loop_, drop_after]);
    func.body = body;

    let graph = LocalGraph::compute(&func);
    // Around the back edge, the set from the previous iteration may reach
    // the read at the loop top; on the first iteration it is the default.
    assert_eq!(
        graph.get_setses[&get_in_loop],
        phi(SetOrigin::Entry, SetOrigin::Set(set))
    );
    assert_eq!(graph.get_setses[&get_after], singleton(SetOrigin::Set(set)));
}

#[test]
fn testUnreachableGetIsAbsent() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![], vec![Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    let br = b.make_br("b", None);
    let get = b.make_local_get(0);
    let drop = b.make_drop(get);
    let block = b.make_block(Some("b".into()), vec![br, drop]);
    func.body = block;

    let graph = LocalGraph::compute(&func);
    // The read cannot execute; no reaching information for it.
    assert!(graph.get_setses.get(&get).is_none());
    assert!(graph.locations.contains(&get));
}

#[test]
fn testEquivalence() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![Type::I32], vec![Type::I32, Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    let one = b.make_i32(1);
    let set_a = b.make_local_set(1, one);
    let get_a1 = b.make_local_get(1);
    let drop_a1 = b.make_drop(get_a1);
    let get_a2 = b.make_local_get(1);
    let drop_a2 = b.make_drop(get_a2);
    let one_again = b.make_i32(1);
    let set_b = b.make_local_set(1, one_again);
    let get_a3 = b.make_local_get(1);
    let drop_a3 = b.make_drop(get_a3);
    let get_param1 = b.make_local_get(0);
    let drop_p1 = b.make_drop(get_param1);
    let get_param2 = b.make_local_get(0);
    let drop_p2 = b.make_drop(get_param2);
    let get_var = b.make_local_get(2);
    let drop_v = b.make_drop(get_var);
    let get_var2 = b.make_local_get(2);
    let drop_v2 = b.make_drop(get_var2);
    let body = b.make_block(
        None,
        vec![
            set_a, drop_a1, drop_a2, set_b, drop_a3, drop_p1, drop_p2, drop_v, drop_v2,
        ],
    );
    func.body = body;

    let graph = LocalGraph::compute(&func);
    // Two reads of the same set are equivalent.
    assert!(graph.equivalent(&func, get_a1, get_a2));
    // A read of a different set is not, even though the written value
    // happens to be equal.
    assert!(!graph.equivalent(&func, get_a1, get_a3));
    // Parameter reads of the incoming argument are equivalent.
    assert!(graph.equivalent(&func, get_param1, get_param2));
    // Default-value reads of a var are not relied upon.
    assert!(!graph.equivalent(&func, get_var, get_var2));
    // Different indexes are never equivalent.
    assert!(!graph.equivalent(&func, get_param1, get_var));
}

#[test]
fn testInfluences() {
    let types = TypeStore::new();
    let mut func = Function::new("test", vec![], vec![Type::I32, Type::I32]);
    let mut b = Builder::new(&types, &mut func);
    // y = 1; x = y; drop(x)
    let one = b.make_i32(1);
    let set_y = b.make_local_set(1, one);
    let get_y = b.make_local_get(1);
    let set_x = b.make_local_set(0, get_y);
    let get_x = b.make_local_get(0);
    let drop_x = b.make_drop(get_x);
    let body = b.make_block(None, vec![set_y, set_x, drop_x]);
    func.body = body;

    let mut graph = LocalGraph::compute(&func);
    graph.compute_influences(&func);

    let y_influence = &graph.set_influences[&set_y];
    assert_eq!(y_influence.len(), 1);
    assert!(y_influence.contains(&get_y));

    let x_influence = &graph.set_influences[&set_x];
    assert_eq!(x_influence.len(), 1);
    assert!(x_influence.contains(&get_x));

    // The value of set_x contains get_y, so get_y influences it.
    let get_y_influences = &graph.get_influences[&get_y];
    assert_eq!(get_y_influences.len(), 1);
    assert!(get_y_influences.contains(&set_x));
    assert!(graph.get_influences.get(&get_x).is_none());
}

#[test]
fn testSsaIndexes() {
    let types = TypeStore::new();
    let mut func = Function::new(
        "test",
        vec![Type::I32],
        vec![Type::I32, Type::I32, Type::I32],
    );
    let mut b = Builder::new(&types, &mut func);
    // Local 1: one set, read only after it. SSA.
    let one = b.make_i32(1);
    let set1 = b.make_local_set(1, one);
    let get1 = b.make_local_get(1);
    let drop1 = b.make_drop(get1);
    // Local 2: read before its only set, so the default also reaches a get.
    let get2_early = b.make_local_get(2);
    let drop2 = b.make_drop(get2_early);
    let two = b.make_i32(2);
    let set2 = b.make_local_set(2, two);
    // Local 3: two sets.
    let three = b.make_i32(3);
    let set3a = b.make_local_set(3, three);
    let four = b.make_i32(4);
    let set3b = b.make_local_set(3, four);
    let body = b.make_block(None, vec![set1, drop1, drop2, set2, set3a, set3b]);
    func.body = body;

    let mut graph = LocalGraph::compute(&func);
    graph.compute_ssa_indexes(&func);
    assert!(graph.is_ssa(1));
    assert!(!graph.is_ssa(2));
    assert!(!graph.is_ssa(3));
    // Parameters admit no lexical set and are never SSA here.
    assert!(!graph.is_ssa(0));
}
