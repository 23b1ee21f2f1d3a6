//! Helpers for implementing [TreeNode](datafusion::common::tree_node::TreeNode) on the
//! tree-shaped types of the query pipeline.

use crate::DFResult;
use datafusion::common::tree_node::{Transformed, TreeNodeRecursion};

/// Applies `f` to all `items` until `f` returns [TreeNodeRecursion::Stop].
pub fn apply_until_stop<'a, T: 'a, F>(
    items: impl IntoIterator<Item = &'a T>,
    mut f: F,
) -> DFResult<TreeNodeRecursion>
where
    F: FnMut(&'a T) -> DFResult<TreeNodeRecursion>,
{
    let mut tnr = TreeNodeRecursion::Continue;
    for item in items {
        tnr = f(item)?;
        if tnr == TreeNodeRecursion::Stop {
            return Ok(TreeNodeRecursion::Stop);
        }
    }
    Ok(tnr)
}

/// Maps all `items` with `f`. Once `f` returns [TreeNodeRecursion::Stop] the remaining items
/// are kept as they are.
pub fn map_until_stop<T, F>(items: Vec<T>, mut f: F) -> DFResult<Transformed<Vec<T>>>
where
    F: FnMut(T) -> DFResult<Transformed<T>>,
{
    let mut tnr = TreeNodeRecursion::Continue;
    let mut transformed = false;
    let data = items
        .into_iter()
        .map(|item| match tnr {
            TreeNodeRecursion::Continue | TreeNodeRecursion::Jump => {
                let result = f(item)?;
                tnr = result.tnr;
                transformed |= result.transformed;
                Ok(result.data)
            }
            TreeNodeRecursion::Stop => Ok(item),
        })
        .collect::<DFResult<Vec<_>>>()?;
    Ok(Transformed::new(data, transformed, tnr))
}

/// Maps two siblings with `f`. The second one is skipped if `f` returns
/// [TreeNodeRecursion::Stop] for the first one.
pub fn map_pair<T, F>(left: T, right: T, mut f: F) -> DFResult<Transformed<(T, T)>>
where
    F: FnMut(T) -> DFResult<Transformed<T>>,
{
    let left = f(left)?;
    if left.tnr == TreeNodeRecursion::Stop {
        return Ok(Transformed::new(
            (left.data, right),
            left.transformed,
            TreeNodeRecursion::Stop,
        ));
    }

    let right = f(right)?;
    Ok(Transformed::new(
        (left.data, right.data),
        left.transformed || right.transformed,
        right.tnr,
    ))
}

/// Maps a boxed child with `f`.
pub fn map_box<T, F>(item: Box<T>, f: F) -> DFResult<Transformed<Box<T>>>
where
    F: FnOnce(T) -> DFResult<Transformed<T>>,
{
    Ok(f(*item)?.update_data(Box::new))
}
