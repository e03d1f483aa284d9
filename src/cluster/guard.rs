use log::warn;

/// Splits implausibly large groups back into singletons.
///
/// Transitive merging under a lenient threshold can chain unrelated logos
/// through weak intermediate matches. A group above `max_group_size` is
/// taken to be such a chain and dissolved. Runs only on finished groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OversizeGuard {
    max_group_size: usize,
}

impl OversizeGuard {
    pub fn new(max_group_size: usize) -> Self {
        Self { max_group_size }
    }

    pub fn max_group_size(&self) -> usize {
        self.max_group_size
    }

    pub fn apply(&self, groups: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            if group.len() > self.max_group_size {
                warn!(
                    "Splitting group of {} members into singletons (limit {})",
                    group.len(),
                    self.max_group_size
                );
                out.extend(group.into_iter().map(|member| vec![member]));
            } else {
                out.push(group);
            }
        }
        out
    }
}
