//! Randomized replay tests for the list change builder.
//!
//! Applies a random mutation script to an observable list and replays the
//! emitted changes over a copy of the initial state. If the change builder
//! compresses faithfully, the replayed copy always matches the final list.

use std::cell::RefCell;
use std::rc::Rc;

use argus_collections::{ListChange, LocalChange, ObservableList};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Push(i32),
    Insert(usize, i32),
    Remove(usize),
    Set(usize, i32),
    Clear,
    Sort,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<i32>()).prop_map(Op::Push),
        (any::<usize>(), any::<i32>()).prop_map(|(index, element)| Op::Insert(index, element)),
        (any::<usize>()).prop_map(Op::Remove),
        (any::<usize>(), any::<i32>()).prop_map(|(index, element)| Op::Set(index, element)),
        Just(Op::Clear),
        Just(Op::Sort),
    ]
}

fn apply_op(list: &ObservableList<i32>, op: &Op) {
    match op {
        Op::Push(element) => list.push(*element),
        Op::Insert(index, element) => {
            let bounded = index % (list.len() + 1);
            list.insert(bounded, *element);
        }
        Op::Remove(index) => {
            if !list.is_empty() {
                let bounded = index % list.len();
                list.remove(bounded);
            }
        }
        Op::Set(index, element) => {
            if !list.is_empty() {
                let bounded = index % list.len();
                list.set(bounded, *element);
            }
        }
        Op::Clear => list.clear(),
        Op::Sort => list.sort(),
    }
}

fn replay(target: &mut Vec<i32>, change: &ListChange<i32>) {
    match change {
        ListChange::Permutation { indices } => {
            let before = target.clone();
            for (old_pos, &new_pos) in indices.iter().enumerate() {
                target[new_pos] = before[old_pos];
            }
        }
        ListChange::Update { local_changes } => {
            for local_change in local_changes {
                match local_change {
                    LocalChange::Insertion { index, elements } => {
                        for (offset, element) in elements.iter().enumerate() {
                            target.insert(index + offset, *element);
                        }
                    }
                    LocalChange::Removal { index, elements } => {
                        for element in elements {
                            assert_eq!(target[*index], *element);
                            target.remove(*index);
                        }
                    }
                    LocalChange::Update {
                        index,
                        old_elements,
                        new_elements,
                    } => {
                        for (offset, element) in new_elements.iter().enumerate() {
                            assert_eq!(target[index + offset], old_elements[offset]);
                            target[index + offset] = *element;
                        }
                    }
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn replayed_changes_reproduce_final_state(
        initial in prop::collection::vec(any::<i32>(), 0..8),
        ops in prop::collection::vec(op_strategy(), 0..24),
    ) {
        let list = ObservableList::from(initial.clone());
        let changes: Rc<RefCell<Vec<ListChange<i32>>>> = Rc::new(RefCell::new(Vec::new()));

        {
            let sink = changes.clone();
            list.add_change_listener(ListChange::listener(move |change: &ListChange<i32>| {
                sink.borrow_mut().push(change.clone());
            }));
        }

        for op in &ops {
            apply_op(&list, op);
        }

        let mut replayed = initial;
        for change in changes.borrow().iter() {
            replay(&mut replayed, change);
        }

        prop_assert_eq!(replayed, list.to_vec());
    }

    #[test]
    fn whole_script_in_one_transaction_emits_at_most_one_change(
        initial in prop::collection::vec(any::<i32>(), 0..8),
        ops in prop::collection::vec(op_strategy(), 0..24),
    ) {
        let list = ObservableList::from(initial.clone());
        let changes: Rc<RefCell<Vec<ListChange<i32>>>> = Rc::new(RefCell::new(Vec::new()));

        {
            let sink = changes.clone();
            list.add_change_listener(ListChange::listener(move |change: &ListChange<i32>| {
                sink.borrow_mut().push(change.clone());
            }));
        }

        {
            let _tx = list.begin_change();
            for op in &ops {
                apply_op(&list, op);
            }
        }

        prop_assert!(changes.borrow().len() <= 1);

        let mut replayed = initial;
        for change in changes.borrow().iter() {
            replay(&mut replayed, change);
        }

        prop_assert_eq!(replayed, list.to_vec());
    }
}
