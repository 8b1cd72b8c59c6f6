//! Assembles the flat todo rows of a collection into a forest of nested
//! nodes. Pure and allocation-local: no storage access, no clocks.

use std::collections::{BTreeMap, HashSet};

use tr_core::{Todo, TodoNode};

/// Build the nested forest for one collection's todos.
///
/// Rules:
/// - A row is a root when it has no parent, when its parent id is not in the
///   input set, or when it names itself as parent.
/// - Children hang under their parent in ascending id order; roots are also
///   emitted in ascending id order.
/// - Every input row appears in the output exactly once, including rows
///   trapped in a parent cycle (those groups are promoted to the top level).
pub fn build_forest(mut todos: Vec<Todo>) -> Vec<TodoNode> {
    todos.sort_by_key(|t| t.id);
    let ids: HashSet<i64> = todos.iter().map(|t| t.id).collect();

    let mut roots: Vec<Todo> = Vec::new();
    let mut children: BTreeMap<i64, Vec<Todo>> = BTreeMap::new();
    for todo in todos {
        match todo.parent_todo_id {
            Some(parent_id) if parent_id != todo.id && ids.contains(&parent_id) => {
                children.entry(parent_id).or_default().push(todo);
            }
            _ => roots.push(todo),
        }
    }

    let mut forest: Vec<TodoNode> = roots
        .into_iter()
        .map(|todo| attach(todo, &mut children))
        .collect();

    // Anything left in the adjacency map was unreachable from a root, which
    // only happens when parent links form a cycle. Promote each leftover
    // group so the node-count invariant holds.
    while let Some(parent_id) = children.keys().next().copied() {
        let orphans = children.remove(&parent_id).unwrap_or_default();
        for todo in orphans {
            forest.push(attach(todo, &mut children));
        }
    }

    forest
}

fn attach(todo: Todo, children: &mut BTreeMap<i64, Vec<Todo>>) -> TodoNode {
    let direct = children.remove(&todo.id).unwrap_or_default();
    TodoNode {
        todo,
        child_todos: direct
            .into_iter()
            .map(|child| attach(child, children))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn row(id: i64, parent: Option<i64>) -> Todo {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        Todo {
            id,
            title: format!("todo-{id}"),
            description: None,
            completed: false,
            due_date: None,
            user_id: 1,
            collection_id: 1,
            parent_todo_id: parent,
            created_at: now,
            updated_at: now,
        }
    }

    fn forest_len(forest: &[TodoNode]) -> usize {
        forest.iter().map(TodoNode::subtree_len).sum()
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        assert!(build_forest(Vec::new()).is_empty());
    }

    #[test]
    fn parentless_rows_become_roots_in_id_order() {
        let forest = build_forest(vec![row(3, None), row(1, None), row(2, None)]);
        let ids: Vec<i64> = forest.iter().map(|n| n.todo.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(forest.iter().all(|n| n.child_todos.is_empty()));
    }

    #[test]
    fn children_nest_under_their_parent() {
        let forest = build_forest(vec![row(1, None), row(2, Some(1)), row(3, Some(1))]);
        assert_eq!(forest.len(), 1);
        let child_ids: Vec<i64> = forest[0].child_todos.iter().map(|n| n.todo.id).collect();
        assert_eq!(child_ids, vec![2, 3]);
    }

    #[test]
    fn nesting_is_recursive() {
        let forest = build_forest(vec![row(1, None), row(2, Some(1)), row(3, Some(2))]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].child_todos.len(), 1);
        assert_eq!(forest[0].child_todos[0].todo.id, 2);
        assert_eq!(forest[0].child_todos[0].child_todos[0].todo.id, 3);
    }

    #[test]
    fn two_independent_trees_stay_separate() {
        let forest = build_forest(vec![
            row(1, None),
            row(2, None),
            row(3, Some(1)),
            row(4, Some(2)),
        ]);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].child_todos[0].todo.id, 3);
        assert_eq!(forest[1].child_todos[0].todo.id, 4);
    }

    #[test]
    fn dangling_parent_promotes_row_to_root() {
        // Parent id 99 is not in the input set.
        let forest = build_forest(vec![row(1, None), row(2, Some(99))]);
        let ids: Vec<i64> = forest.iter().map(|n| n.todo.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn self_parent_promotes_row_to_root() {
        let forest = build_forest(vec![row(1, Some(1))]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].todo.id, 1);
        assert!(forest[0].child_todos.is_empty());
    }

    #[test]
    fn cycle_rows_are_kept_not_dropped() {
        // 1 -> 2 -> 1: unreachable from any root, still must appear.
        let forest = build_forest(vec![row(1, Some(2)), row(2, Some(1)), row(3, None)]);
        assert_eq!(forest_len(&forest), 3);
    }

    #[test]
    fn every_input_row_appears_exactly_once() {
        let input = vec![
            row(1, None),
            row(2, Some(1)),
            row(3, Some(2)),
            row(4, Some(42)),
            row(5, Some(5)),
            row(6, None),
            row(7, Some(6)),
        ];
        let n = input.len();
        let forest = build_forest(input);
        assert_eq!(forest_len(&forest), n);
    }

    #[test]
    fn input_order_does_not_matter() {
        let shuffled = vec![row(3, Some(2)), row(1, None), row(2, Some(1))];
        let sorted = vec![row(1, None), row(2, Some(1)), row(3, Some(2))];
        assert_eq!(build_forest(shuffled), build_forest(sorted));
    }
}
