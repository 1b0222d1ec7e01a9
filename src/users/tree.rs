//! Flat user list to nested forest.
//!
//! Children are resolved through a `parent id -> indices` index built once per
//! call, so construction is linear in the number of users. Records are moved
//! out of the flat list into the nodes; nothing is cloned.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::users::model::{User, UserNode};

/// Deepest level `build_tree` will produce. Nested nodes are serialized and
/// dropped recursively, so depth has to stay well inside a worker stack.
pub const MAX_TREE_DEPTH: usize = 256;

/// Builds the forest whose roots are the users with `parent_user_id == root_parent`.
///
/// `root_parent = None` yields every tree hanging off a parentless user.
/// Users whose parent is absent from `users` are unreachable from any root.
/// Any parent cycle in the input fails with `CyclicHierarchy`; a branch deeper
/// than `MAX_TREE_DEPTH` fails with `HierarchyTooDeep`.
pub fn build_tree(users: Vec<User>, root_parent: Option<Uuid>) -> UserResult<Vec<UserNode>> {
    ensure_acyclic(&users)?;

    let mut children: HashMap<Option<Uuid>, Vec<usize>> = HashMap::new();
    for (idx, user) in users.iter().enumerate() {
        children.entry(user.parent_user_id).or_default().push(idx);
    }

    let mut slots: Vec<Option<User>> = users.into_iter().map(Some).collect();
    assemble(root_parent, &children, &mut slots)
}

/// A node whose children are still being assembled.
struct Pending<'a> {
    user: User,
    child_indices: &'a [usize],
    next: usize,
    built: Vec<UserNode>,
}

impl<'a> Pending<'a> {
    fn new(user: User, children: &'a HashMap<Option<Uuid>, Vec<usize>>) -> Self {
        let child_indices = children
            .get(&Some(user.id))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Self {
            user,
            child_indices,
            next: 0,
            built: Vec::new(),
        }
    }
}

/// Post-order assembly over an explicit stack; the stack length is the depth.
fn assemble(
    root_parent: Option<Uuid>,
    children: &HashMap<Option<Uuid>, Vec<usize>>,
    slots: &mut [Option<User>],
) -> UserResult<Vec<UserNode>> {
    let mut forest = Vec::new();
    let Some(roots) = children.get(&root_parent) else {
        return Ok(forest);
    };

    let mut stack: Vec<Pending<'_>> = Vec::new();
    for &root in roots {
        // duplicate ids may point at a record twice; the first visit wins
        let Some(user) = slots.get_mut(root).and_then(Option::take) else {
            continue;
        };
        stack.push(Pending::new(user, children));

        while let Some(top) = stack.last_mut() {
            if let Some(&idx) = top.child_indices.get(top.next) {
                top.next += 1;
                let Some(user) = slots.get_mut(idx).and_then(Option::take) else {
                    continue;
                };
                if stack.len() >= MAX_TREE_DEPTH {
                    return Err(UserError::HierarchyTooDeep(MAX_TREE_DEPTH));
                }
                stack.push(Pending::new(user, children));
                continue;
            }

            let Some(done) = stack.pop() else { break };
            let node = UserNode {
                user: done.user,
                children: done.built,
            };
            match stack.last_mut() {
                Some(parent) => parent.built.push(node),
                None => forest.push(node),
            }
        }
    }
    Ok(forest)
}

/// Each user has at most one parent, so following parent links from every
/// user and remembering settled ids finds any cycle in O(n).
fn ensure_acyclic(users: &[User]) -> UserResult<()> {
    let parent_of: HashMap<Uuid, Option<Uuid>> =
        users.iter().map(|u| (u.id, u.parent_user_id)).collect();
    let mut settled: HashSet<Uuid> = HashSet::with_capacity(users.len());

    for user in users {
        let mut path = HashSet::new();
        let mut cursor = Some(user.id);
        while let Some(id) = cursor {
            if settled.contains(&id) {
                break;
            }
            if !path.insert(id) {
                return Err(UserError::CyclicHierarchy(id));
            }
            cursor = parent_of.get(&id).copied().flatten();
        }
        settled.extend(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn user(n: u128, parent: Option<u128>) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: id(n),
            username: format!("user-{n}"),
            password_hash: "hash".into(),
            parent_user_id: parent.map(id),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn ids(nodes: &[UserNode]) -> Vec<Uuid> {
        nodes.iter().map(|n| n.user.id).collect()
    }

    #[test]
    fn nests_children_under_their_parents() {
        let users = vec![
            user(1, None),
            user(2, Some(1)),
            user(3, Some(1)),
            user(4, Some(2)),
        ];
        let forest = build_tree(users, None).unwrap();

        assert_eq!(ids(&forest), vec![id(1)]);
        let root = &forest[0];
        assert_eq!(ids(&root.children), vec![id(2), id(3)]);
        assert_eq!(ids(&root.children[0].children), vec![id(4)]);
        assert!(root.children[1].children.is_empty());
    }

    #[test]
    fn roots_at_a_given_user() {
        let users = vec![
            user(1, None),
            user(2, Some(1)),
            user(3, Some(1)),
            user(4, Some(2)),
        ];
        let forest = build_tree(users, Some(id(2))).unwrap();
        assert_eq!(ids(&forest), vec![id(4)]);
    }

    #[test]
    fn empty_input_is_an_empty_forest() {
        assert!(build_tree(Vec::new(), None).unwrap().is_empty());
    }

    #[test]
    fn parent_cycle_is_rejected() {
        let users = vec![user(1, Some(2)), user(2, Some(1))];
        let err = build_tree(users.clone(), Some(id(1))).unwrap_err();
        assert!(matches!(err, UserError::CyclicHierarchy(_)));

        // also when no root would ever reach it
        let err = build_tree(users, None).unwrap_err();
        assert!(matches!(err, UserError::CyclicHierarchy(_)));
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let err = build_tree(vec![user(1, None), user(7, Some(7))], None).unwrap_err();
        assert!(matches!(err, UserError::CyclicHierarchy(c) if c == id(7)));
    }

    #[test]
    fn orphans_are_unreachable_from_the_top() {
        let users = vec![user(1, None), user(5, Some(99)), user(6, Some(5))];
        let forest = build_tree(users, None).unwrap();
        assert_eq!(ids(&forest), vec![id(1)]);
    }

    #[test]
    fn deleted_users_stay_in_the_tree() {
        let mut gone = user(2, Some(1));
        gone.deleted_at = Some(OffsetDateTime::now_utc());
        let forest = build_tree(vec![user(1, None), gone, user(3, Some(2))], None).unwrap();
        assert_eq!(ids(&forest[0].children), vec![id(2)]);
        assert_eq!(ids(&forest[0].children[0].children), vec![id(3)]);
    }

    fn chain(len: u128) -> Vec<User> {
        let mut users = vec![user(0, None)];
        users.extend((1..len).map(|n| user(n, Some(n - 1))));
        users
    }

    /// Runs `f` on a thread with tokio's default worker stack size.
    fn on_worker_sized_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn chain_at_max_depth_builds_serializes_and_drops() {
        let json = on_worker_sized_stack(|| {
            let forest = build_tree(chain(MAX_TREE_DEPTH as u128), None).unwrap();

            let mut depth = 0;
            let mut level = &forest;
            while let Some(node) = level.first() {
                depth += 1;
                level = &node.children;
            }
            assert_eq!(depth, MAX_TREE_DEPTH);
            serde_json::to_string(&forest).unwrap()
        });
        assert!(json.contains("user-0"));
    }

    #[test]
    fn very_deep_chain_is_an_error_not_a_crash() {
        let err = on_worker_sized_stack(|| build_tree(chain(10_000), None).unwrap_err());
        assert!(matches!(err, UserError::HierarchyTooDeep(MAX_TREE_DEPTH)));
    }

    #[test]
    fn depth_is_counted_from_the_requested_root() {
        // 300 levels overall, but only 249 below user 50
        let forest = on_worker_sized_stack(|| build_tree(chain(300), Some(id(50))));
        let forest = forest.unwrap();
        assert_eq!(ids(&forest), vec![id(51)]);
    }
}
