use alloc::{collections::BTreeSet, sync::Arc, vec::Vec};

use crate::{any::TypeInfo, key::ServiceKey};

/// Searches the dependency graph of a candidate registration for a path back to `target`
/// or to the candidate implementation itself.
///
/// `dependencies_of` returns the direct dependencies of a registered key, unregistered keys are leaves.
/// Every key is expanded at most once, so graphs that are cyclic elsewhere terminate.
///
/// Returns the chain from `target` to the repeated key if a cycle is found.
pub(crate) fn find_cycle(
    dependencies_of: &dyn Fn(&ServiceKey) -> Option<Arc<[ServiceKey]>>,
    implementation: TypeInfo,
    target: &ServiceKey,
    dependencies: &[ServiceKey],
) -> Option<Vec<ServiceKey>> {
    let implementation = ServiceKey::Type(implementation);
    let mut visited = BTreeSet::new();
    let mut chain = Vec::from([target.clone()]);

    if check_recurse(
        dependencies_of,
        &[target, &implementation],
        &mut visited,
        &mut chain,
        dependencies,
    ) {
        return Some(chain);
    }
    return None;

    fn check_recurse(
        dependencies_of: &dyn Fn(&ServiceKey) -> Option<Arc<[ServiceKey]>>,
        targets: &[&ServiceKey],
        visited: &mut BTreeSet<ServiceKey>,
        chain: &mut Vec<ServiceKey>,
        dependencies: &[ServiceKey],
    ) -> bool {
        for dependency in dependencies {
            chain.push(dependency.clone());

            if targets.contains(&dependency) {
                return true;
            }

            // Each key is expanded once
            if visited.insert(dependency.clone()) {
                if let Some(next) = dependencies_of(dependency) {
                    if check_recurse(dependencies_of, targets, visited, chain, &next) {
                        return true;
                    }
                }
            }

            chain.pop();
        }
        false
    }
}
