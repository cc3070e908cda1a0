use crate::event::Table;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter},
    hash::Hash,
};

/// Identifier of a downstream subscriber channel.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct SubscriberId(pub SmolStr);

impl Display for SubscriberId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S> From<S> for SubscriberId
where
    S: Into<SmolStr>,
{
    fn from(input: S) -> Self {
        Self(input.into())
    }
}

/// Symbol key of a registration: one specific symbol, or the wildcard `*` for all symbols.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum SymbolKey {
    All,
    Symbol(SmolStr),
}

impl SymbolKey {
    pub const WILDCARD: &'static str = "*";

    pub fn is_all(&self) -> bool {
        matches!(self, SymbolKey::All)
    }

    /// Specific symbol of the key, `None` for the wildcard.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            SymbolKey::All => None,
            SymbolKey::Symbol(symbol) => Some(symbol),
        }
    }
}

impl From<Option<&str>> for SymbolKey {
    fn from(symbol: Option<&str>) -> Self {
        match symbol {
            None | Some(SymbolKey::WILDCARD) => SymbolKey::All,
            Some(symbol) => SymbolKey::Symbol(SmolStr::new(symbol)),
        }
    }
}

impl Display for SymbolKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKey::All => f.write_str(SymbolKey::WILDCARD),
            SymbolKey::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

type Keys = BTreeMap<SymbolKey, BTreeSet<SubscriberId>>;

/// Tracks, per channel, which symbols (or the wildcard) are wanted by which subscribers.
///
/// Owned by exactly one [`Router`](crate::router::Router), so no internal locking is used.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry<Channel = Table> {
    channels: FnvHashMap<Channel, Keys>,
}

impl<Channel> Default for SubscriptionRegistry<Channel> {
    fn default() -> Self {
        Self {
            channels: FnvHashMap::default(),
        }
    }
}

impl<Channel> SubscriptionRegistry<Channel>
where
    Channel: Eq + Hash + Clone,
{
    /// Register the subscriber for the channel and symbol (wildcard if `None`).
    ///
    /// Returns whether the effective key is newly created, alongside the effective key. While a
    /// wildcard exists for the channel, specific symbol registrations are absorbed into it.
    pub fn register(
        &mut self,
        subscriber: SubscriberId,
        channel: Channel,
        symbol: Option<&str>,
    ) -> (bool, SymbolKey) {
        let keys = self.channels.entry(channel).or_default();

        let key = if keys.contains_key(&SymbolKey::All) {
            SymbolKey::All
        } else {
            SymbolKey::from(symbol)
        };

        let changed = !keys.contains_key(&key);
        keys.entry(key.clone()).or_default().insert(subscriber);

        if key.is_all() {
            absorb(keys);
        }

        (changed, key)
    }

    /// Remove the subscriber from the channel and symbol (wildcard if `None`).
    ///
    /// Returns whether the key is now empty (and therefore deleted), alongside the key. Removing
    /// a registration that does not exist is a no-op returning `(false, None)`.
    pub fn unregister(
        &mut self,
        subscriber: &SubscriberId,
        channel: &Channel,
        symbol: Option<&str>,
    ) -> (bool, Option<SymbolKey>) {
        let key = SymbolKey::from(symbol);

        let Some(keys) = self.channels.get_mut(channel) else {
            return (false, None);
        };

        let Some(subscribers) = keys.get_mut(&key) else {
            return (false, None);
        };

        if !subscribers.remove(subscriber) {
            return (false, None);
        }

        let now_empty = subscribers.is_empty();
        if now_empty {
            keys.remove(&key);
            if keys.is_empty() {
                self.channels.remove(channel);
            }
        }

        (now_empty, Some(key))
    }

    /// Determines if anyone is subscribed to the channel for the symbol.
    ///
    /// With a specific symbol this is true if the wildcard or the exact symbol key has a
    /// subscriber. With `None` this is true if any key of the channel has a subscriber.
    pub fn is_registered(&self, channel: &Channel, symbol: Option<&str>) -> bool {
        let Some(keys) = self.channels.get(channel) else {
            return false;
        };

        let occupied = |key: &SymbolKey| keys.get(key).is_some_and(|set| !set.is_empty());

        match symbol {
            None => keys.values().any(|subscribers| !subscribers.is_empty()),
            Some(symbol) => {
                occupied(&SymbolKey::All) || occupied(&SymbolKey::Symbol(SmolStr::new(symbol)))
            }
        }
    }

    /// Negation of [`Self::is_registered`]. While a wildcard is active, no symbol of the channel
    /// is unregistered.
    pub fn is_unregistered(&self, channel: &Channel, symbol: Option<&str>) -> bool {
        !self.is_registered(channel, symbol)
    }

    /// Merge every specific symbol key of the channel into the wildcard key, if a wildcard
    /// exists. Returns the specific keys that were merged away.
    pub fn remap(&mut self, channel: &Channel) -> Vec<SymbolKey> {
        self.channels
            .get_mut(channel)
            .map(absorb)
            .unwrap_or_default()
    }

    /// Keys currently registered for the channel, wildcard first.
    pub fn keys(&self, channel: &Channel) -> Vec<SymbolKey> {
        self.channels
            .get(channel)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Subscribers registered under the channel and key.
    pub fn subscribers(&self, channel: &Channel, key: &SymbolKey) -> Vec<SubscriberId> {
        self.channels
            .get(channel)
            .and_then(|keys| keys.get(key))
            .map(|subscribers| subscribers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove the whole key from the channel, returning its subscribers.
    pub fn remove(&mut self, channel: &Channel, key: &SymbolKey) -> Vec<SubscriberId> {
        let Some(keys) = self.channels.get_mut(channel) else {
            return Vec::new();
        };

        let removed = keys
            .remove(key)
            .map(|subscribers| subscribers.into_iter().collect())
            .unwrap_or_default();

        if keys.is_empty() {
            self.channels.remove(channel);
        }

        removed
    }

    /// Iterator over every registered `(channel, key)` pair.
    pub fn iter(&self) -> impl Iterator<Item = (&Channel, &SymbolKey)> {
        self.channels
            .iter()
            .flat_map(|(channel, keys)| keys.keys().map(move |key| (channel, key)))
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Merge all specific keys into the wildcard key, returning the keys merged away.
fn absorb(keys: &mut Keys) -> Vec<SymbolKey> {
    if !keys.contains_key(&SymbolKey::All) {
        return Vec::new();
    }

    let specific = keys
        .keys()
        .filter(|key| !key.is_all())
        .cloned()
        .collect::<Vec<_>>();

    let merged = specific
        .iter()
        .filter_map(|key| keys.remove(key))
        .flatten()
        .collect::<BTreeSet<_>>();

    keys.entry(SymbolKey::All).or_default().extend(merged);

    specific
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> SubscriberId {
        SubscriberId::from(value)
    }

    #[test]
    fn test_register() {
        struct TestCase {
            registry: SubscriptionRegistry<Table>,
            subscriber: &'static str,
            symbol: Option<&'static str>,
            expected: (bool, SymbolKey),
        }

        let mut with_symbol = SubscriptionRegistry::default();
        with_symbol.register(id("a"), Table::Trade, Some("XBTUSD"));

        let mut with_wildcard = SubscriptionRegistry::default();
        with_wildcard.register(id("a"), Table::Trade, None);

        let tests = vec![
            TestCase {
                // TC0: first registration creates the key
                registry: SubscriptionRegistry::default(),
                subscriber: "a",
                symbol: Some("XBTUSD"),
                expected: (true, SymbolKey::Symbol(SmolStr::new("XBTUSD"))),
            },
            TestCase {
                // TC1: second subscriber joins the existing key
                registry: with_symbol.clone(),
                subscriber: "b",
                symbol: Some("XBTUSD"),
                expected: (false, SymbolKey::Symbol(SmolStr::new("XBTUSD"))),
            },
            TestCase {
                // TC2: symbol None registers the wildcard
                registry: with_symbol,
                subscriber: "a",
                symbol: None,
                expected: (true, SymbolKey::All),
            },
            TestCase {
                // TC3: specific registration absorbed into active wildcard
                registry: with_wildcard.clone(),
                subscriber: "a",
                symbol: Some("ETHUSD"),
                expected: (false, SymbolKey::All),
            },
            TestCase {
                // TC4: literal "*" is the wildcard
                registry: with_wildcard,
                subscriber: "b",
                symbol: Some("*"),
                expected: (false, SymbolKey::All),
            },
        ];

        for (index, mut test) in tests.into_iter().enumerate() {
            let actual = test
                .registry
                .register(id(test.subscriber), Table::Trade, test.symbol);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_unregister() {
        let mut registry = SubscriptionRegistry::default();
        registry.register(id("a"), Table::OrderBook, Some("XBTUSD"));
        registry.register(id("b"), Table::OrderBook, Some("XBTUSD"));

        // Unknown subscriber is a no-op
        assert_eq!(
            registry.unregister(&id("c"), &Table::OrderBook, Some("XBTUSD")),
            (false, None)
        );

        // Unknown key is a no-op
        assert_eq!(
            registry.unregister(&id("a"), &Table::OrderBook, Some("ETHUSD")),
            (false, None)
        );

        // Unknown channel is a no-op
        assert_eq!(
            registry.unregister(&id("a"), &Table::Trade, Some("XBTUSD")),
            (false, None)
        );

        let key = SymbolKey::Symbol(SmolStr::new("XBTUSD"));
        assert_eq!(
            registry.unregister(&id("a"), &Table::OrderBook, Some("XBTUSD")),
            (false, Some(key.clone()))
        );
        assert_eq!(
            registry.unregister(&id("b"), &Table::OrderBook, Some("XBTUSD")),
            (true, Some(key))
        );

        // Last key removed deletes the channel
        assert!(registry.is_empty());
        assert!(registry.is_unregistered(&Table::OrderBook, None));
    }

    #[test]
    fn test_wildcard_absorbs_specific_registrations() {
        let mut registry = SubscriptionRegistry::default();
        registry.register(id("a"), Table::Trade, Some("XBTUSD"));
        registry.register(id("b"), Table::Trade, Some("ETHUSD"));
        registry.register(id("c"), Table::Symbol, Some("XBTUSD"));

        registry.register(id("a"), Table::Trade, None);

        // Only the wildcard key survives, holding every subscriber
        assert_eq!(registry.keys(&Table::Trade), vec![SymbolKey::All]);
        assert_eq!(
            registry.subscribers(&Table::Trade, &SymbolKey::All),
            vec![id("a"), id("b")]
        );

        // Every symbol is registered while the wildcard is active
        for symbol in ["XBTUSD", "ETHUSD", "SOLUSD"] {
            assert!(registry.is_registered(&Table::Trade, Some(symbol)));
            assert!(!registry.is_unregistered(&Table::Trade, Some(symbol)));
        }

        // Other channels are unaffected
        assert!(registry.is_registered(&Table::Symbol, Some("XBTUSD")));
        assert!(registry.is_unregistered(&Table::Symbol, Some("ETHUSD")));
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Register(&'static str, Table, Option<&'static str>),
        Unregister(&'static str, Table, Option<&'static str>),
    }

    impl Step {
        fn apply(self, registry: &mut SubscriptionRegistry<Table>) {
            match self {
                Step::Register(subscriber, channel, symbol) => {
                    registry.register(id(subscriber), channel, symbol);
                }
                Step::Unregister(subscriber, channel, symbol) => {
                    registry.unregister(&id(subscriber), &channel, symbol);
                }
            }
        }
    }

    /// No specific key coexists with a wildcard of the same channel, and the wildcard covers
    /// every symbol.
    fn assert_wildcard_exclusive(registry: &SubscriptionRegistry<Table>, context: &str) {
        for (channel, keys) in &registry.channels {
            assert!(
                keys.values().all(|subscribers| !subscribers.is_empty()),
                "{context}: empty key left for {channel:?}: {keys:?}"
            );

            if !keys.contains_key(&SymbolKey::All) {
                continue;
            }

            assert_eq!(
                keys.len(),
                1,
                "{context}: wildcard of {channel:?} coexists with {keys:?}"
            );
            for symbol in ["XBTUSD", "ETHUSD", "SOLUSD"] {
                assert!(
                    registry.is_registered(channel, Some(symbol)),
                    "{context}: {symbol} unregistered under wildcard of {channel:?}"
                );
            }
        }
    }

    #[test]
    fn test_wildcard_absorption_holds_across_scripts() {
        struct TestCase {
            steps: Vec<Step>,
            expected: Vec<(Table, Vec<SymbolKey>)>,
        }

        let xbt = || SymbolKey::Symbol(SmolStr::new("XBTUSD"));
        let eth = || SymbolKey::Symbol(SmolStr::new("ETHUSD"));

        let tests = vec![
            TestCase {
                // TC0: wildcard after specific keys of several subscribers
                steps: vec![
                    Step::Register("a", Table::Trade, Some("XBTUSD")),
                    Step::Register("b", Table::Trade, Some("ETHUSD")),
                    Step::Register("b", Table::Trade, None),
                    Step::Register("a", Table::Trade, Some("SOLUSD")),
                ],
                expected: vec![(Table::Trade, vec![SymbolKey::All])],
            },
            TestCase {
                // TC1: wildcard of one table leaves other tables untouched
                steps: vec![
                    Step::Register("a", Table::Trade, Some("XBTUSD")),
                    Step::Register("a", Table::QuoteBin, Some("XBTUSD")),
                    Step::Register("a", Table::QuoteBin, None),
                ],
                expected: vec![
                    (Table::Trade, vec![xbt()]),
                    (Table::QuoteBin, vec![SymbolKey::All]),
                ],
            },
            TestCase {
                // TC2: absorbed specific key cannot be unregistered on its own
                steps: vec![
                    Step::Register("a", Table::Trade, Some("XBTUSD")),
                    Step::Register("a", Table::Trade, None),
                    Step::Unregister("a", Table::Trade, Some("XBTUSD")),
                ],
                expected: vec![(Table::Trade, vec![SymbolKey::All])],
            },
            TestCase {
                // TC3: specific keys registered after the wildcard is released stand alone
                steps: vec![
                    Step::Register("a", Table::Trade, None),
                    Step::Unregister("a", Table::Trade, None),
                    Step::Register("a", Table::Trade, Some("ETHUSD")),
                    Step::Register("b", Table::Trade, Some("XBTUSD")),
                ],
                expected: vec![(Table::Trade, vec![eth(), xbt()])],
            },
            TestCase {
                // TC4: wildcard survives until its last subscriber leaves
                steps: vec![
                    Step::Register("a", Table::OrderBook, Some("XBTUSD")),
                    Step::Register("b", Table::OrderBook, None),
                    Step::Unregister("b", Table::OrderBook, None),
                    Step::Unregister("a", Table::OrderBook, None),
                ],
                expected: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut registry = SubscriptionRegistry::default();
            for (step_index, step) in test.steps.iter().enumerate() {
                step.apply(&mut registry);
                assert_wildcard_exclusive(&registry, &format!("TC{index} step {step_index}"));
            }

            for (channel, keys) in &test.expected {
                assert_eq!(&registry.keys(channel), keys, "TC{} failed", index);
            }
            assert_eq!(
                registry.channels.len(),
                test.expected.len(),
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_wildcard_absorption_holds_for_every_short_script() {
        use itertools::Itertools;

        let steps = ["a", "b"]
            .into_iter()
            .cartesian_product([Table::Trade, Table::QuoteBin])
            .cartesian_product([Some("XBTUSD"), Some("ETHUSD"), None])
            .flat_map(|((subscriber, channel), symbol)| {
                [
                    Step::Register(subscriber, channel, symbol),
                    Step::Unregister(subscriber, channel, symbol),
                ]
            })
            .collect::<Vec<_>>();

        for script in std::iter::repeat_n(steps.iter().copied(), 3).multi_cartesian_product() {
            let mut registry = SubscriptionRegistry::default();
            for step in &script {
                step.apply(&mut registry);
                assert_wildcard_exclusive(&registry, &format!("{script:?}"));
            }
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = SubscriptionRegistry::default();
        assert!(registry.register(id("a"), Table::Trade, None).0);
        assert!(!registry.register(id("a"), Table::Trade, None).0);
        assert!(!registry.register(id("a"), Table::Trade, Some("XBTUSD")).0);

        assert_eq!(registry.keys(&Table::Trade), vec![SymbolKey::All]);
        assert_eq!(
            registry.subscribers(&Table::Trade, &SymbolKey::All),
            vec![id("a")]
        );
    }

    #[test]
    fn test_remap() {
        let mut registry = SubscriptionRegistry::default();
        registry.register(id("a"), Table::QuoteBin, Some("XBTUSD"));

        // No wildcard, nothing to merge
        assert!(registry.remap(&Table::QuoteBin).is_empty());

        // Transient coexistence of wildcard and specific entries is merged away
        registry
            .channels
            .get_mut(&Table::QuoteBin)
            .unwrap()
            .insert(SymbolKey::All, BTreeSet::from([id("b")]));

        assert_eq!(
            registry.remap(&Table::QuoteBin),
            vec![SymbolKey::Symbol(SmolStr::new("XBTUSD"))]
        );
        assert_eq!(registry.keys(&Table::QuoteBin), vec![SymbolKey::All]);
        assert_eq!(
            registry.subscribers(&Table::QuoteBin, &SymbolKey::All),
            vec![id("a"), id("b")]
        );
        assert!(registry.remap(&Table::QuoteBin).is_empty());
    }

    #[test]
    fn test_is_registered() {
        struct TestCase {
            channel: Table,
            symbol: Option<&'static str>,
            expected: bool,
        }

        let mut registry = SubscriptionRegistry::default();
        registry.register(id("a"), Table::OrderBook, Some("XBTUSD"));

        let tests = vec![
            TestCase {
                // TC0: exact symbol
                channel: Table::OrderBook,
                symbol: Some("XBTUSD"),
                expected: true,
            },
            TestCase {
                // TC1: other symbol without wildcard
                channel: Table::OrderBook,
                symbol: Some("ETHUSD"),
                expected: false,
            },
            TestCase {
                // TC2: any key of the channel
                channel: Table::OrderBook,
                symbol: None,
                expected: true,
            },
            TestCase {
                // TC3: unknown channel
                channel: Table::Trade,
                symbol: None,
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = registry.is_registered(&test.channel, test.symbol);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_remove_and_iter() {
        let mut registry = SubscriptionRegistry::default();
        registry.register(id("a"), Table::Order, None);
        registry.register(id("a"), Table::Trade, Some("XBTUSD"));

        let mut pairs = registry
            .iter()
            .map(|(channel, key)| (*channel, key.clone()))
            .collect::<Vec<_>>();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (Table::Trade, SymbolKey::Symbol(SmolStr::new("XBTUSD"))),
                (Table::Order, SymbolKey::All),
            ]
        );

        assert_eq!(registry.remove(&Table::Order, &SymbolKey::All), vec![id("a")]);
        assert!(registry.is_unregistered(&Table::Order, None));
        assert!(registry.remove(&Table::Order, &SymbolKey::All).is_empty());
    }
}
