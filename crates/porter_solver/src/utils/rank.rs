/// Defines a dense rank into one of the problem's canonical arrays
/// (jobs, vehicles, locations, profiles).
///
/// Ranks are `u32` under the hood: route task lists and the cached position
/// maps are copied on every commit, so a compact index buys more than
/// headroom no instance ever uses. `new` takes plain `usize` so call sites
/// can stay in enumerate/len territory; overflow is a debug-time bug, not a
/// runtime concern.
#[macro_export]
macro_rules! define_rank {
    ($name:ident indexes $plural:literal) => {
        #[derive(
            serde::Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            pub fn new(rank: usize) -> Self {
                debug_assert!(
                    u32::try_from(rank).is_ok(),
                    concat!("rank overflows the ", $plural, " index space"),
                );
                Self(rank as u32)
            }

            pub const fn get(self) -> usize {
                self.0 as usize
            }

            /// All ranks below `count`, in order.
            pub fn all(count: usize) -> impl Iterator<Item = Self> {
                (0..count).map(Self::new)
            }
        }

        impl From<usize> for $name {
            fn from(rank: usize) -> Self {
                Self::new(rank)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    define_rank!(ThingIdx indexes "things");

    #[test]
    fn test_round_trip() {
        let rank = ThingIdx::new(42);
        assert_eq!(rank.get(), 42);
        assert_eq!(ThingIdx::from(42_usize), rank);
        assert_eq!(format!("{rank}"), "#42");
    }

    #[test]
    fn test_all_is_ordered() {
        let ranks: Vec<ThingIdx> = ThingIdx::all(3).collect();
        assert_eq!(ranks, vec![ThingIdx::new(0), ThingIdx::new(1), ThingIdx::new(2)]);
        assert!(ranks[0] < ranks[2]);
    }
}
