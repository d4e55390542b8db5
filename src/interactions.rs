use crate::elements;
use crate::error::{FeaturizeError, Result};
use std::collections::HashSet;
use std::hash::Hash;

pub type Pair = (String, String);
pub type Triple = (String, String, String);

/// Which 1-, 2- and (optionally) 3-body element combinations the featurizer tracks.
///
/// Tuples are unique within each order and keep the order they were given in. An empty
/// 3-body block is stored as no 3-body block, so the map has degree 2.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMap {
    one_body: Vec<String>,
    two_body: Vec<Pair>,
    three_body: Option<Vec<Triple>>,
}

impl InteractionMap {
    pub fn new(
        one_body: Vec<String>,
        two_body: Vec<Pair>,
        three_body: Option<Vec<Triple>>,
    ) -> Result<Self> {
        let three_body = three_body.filter(|t| !t.is_empty());
        check_unique(1, &one_body)?;
        check_unique(2, &two_body)?;
        if let Some(t) = &three_body {
            check_unique(3, t)?;
        }
        Ok(Self {
            one_body,
            two_body,
            three_body,
        })
    }

    pub fn one_body(&self) -> &[String] {
        &self.one_body
    }

    pub fn two_body(&self) -> &[Pair] {
        &self.two_body
    }

    pub fn three_body(&self) -> Option<&[Triple]> {
        self.three_body.as_deref()
    }

    /// Highest interaction order present (2 or 3).
    pub fn degree(&self) -> usize {
        if self.three_body.is_some() { 3 } else { 2 }
    }
}

fn check_unique<T: Eq + Hash + std::fmt::Debug>(order: usize, items: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item) {
            return Err(FeaturizeError::DuplicateInteraction {
                order,
                key: format!("{:?}", item),
            });
        }
    }
    Ok(())
}

/// The element set of a fit together with its interaction map.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemicalSystem {
    element_list: Vec<String>,
    interactions_map: InteractionMap,
}

impl ChemicalSystem {
    /// Generates the interaction map for `symbols` up to `degree` (2 or 3).
    ///
    /// Elements are sorted by atomic number. Pairs are combinations with replacement;
    /// triples pair every element with every 2-body combination.
    pub fn new<S: AsRef<str>>(symbols: &[S], degree: usize) -> Result<Self> {
        if !(2..=3).contains(&degree) {
            return Err(FeaturizeError::InvalidDegree(degree));
        }

        let mut numbered = symbols
            .iter()
            .map(|s| -> Result<(u8, String)> {
                Ok((elements::atomic_number(s.as_ref())?, s.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        numbered.sort_by_key(|(z, _)| *z);
        let element_list: Vec<String> = numbered.into_iter().map(|(_, s)| s).collect();

        let mut two_body = Vec::new();
        for (i, a) in element_list.iter().enumerate() {
            for b in &element_list[i..] {
                two_body.push((a.clone(), b.clone()));
            }
        }

        let three_body = (degree == 3).then(|| {
            let mut triples = Vec::with_capacity(element_list.len() * two_body.len());
            for a in &element_list {
                for (b, c) in &two_body {
                    triples.push((a.clone(), b.clone(), c.clone()));
                }
            }
            triples
        });

        let interactions_map = InteractionMap::new(element_list.clone(), two_body, three_body)?;
        Ok(Self {
            element_list,
            interactions_map,
        })
    }

    /// Wraps an explicit interaction map; the element list is its 1-body block.
    pub fn from_interactions_map(interactions_map: InteractionMap) -> Self {
        Self {
            element_list: interactions_map.one_body().to_vec(),
            interactions_map,
        }
    }

    pub fn element_list(&self) -> &[String] {
        &self.element_list
    }

    pub fn interactions_map(&self) -> &InteractionMap {
        &self.interactions_map
    }

    pub fn degree(&self) -> usize {
        self.interactions_map.degree()
    }
}

/// An interaction with its element symbols replaced by atomic numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKey {
    One(u8),
    Two(u8, u8),
    Three(u8, u8, u8),
}

impl InteractionKey {
    pub fn order(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(..) => 2,
            Self::Three(..) => 3,
        }
    }
}

/// Flattens `map` into numeric keys: the 1-body block first, then 2-body, then 3-body
/// when present. Fails on the first symbol with no atomic number.
pub fn canonicalize(map: &InteractionMap) -> Result<Vec<InteractionKey>> {
    let z = elements::atomic_number;
    let n_three = map.three_body().map_or(0, |t| t.len());
    let mut keys = Vec::with_capacity(map.one_body().len() + map.two_body().len() + n_three);

    for a in map.one_body() {
        keys.push(InteractionKey::One(z(a)?));
    }
    for (a, b) in map.two_body() {
        keys.push(InteractionKey::Two(z(a)?, z(b)?));
    }
    if let Some(triples) = map.three_body() {
        for (a, b, c) in triples {
            keys.push(InteractionKey::Three(z(a)?, z(b)?, z(c)?));
        }
    }
    Ok(keys)
}

/// Rebuilds the symbolic map from canonical keys.
pub fn decode_interactions(keys: &[InteractionKey]) -> Result<InteractionMap> {
    let sym = |z: u8| {
        elements::symbol(z)
            .map(str::to_string)
            .ok_or_else(|| FeaturizeError::UnknownElement(format!("Z={}", z)))
    };

    let mut one_body = Vec::new();
    let mut two_body = Vec::new();
    let mut three_body = Vec::new();
    let mut last_order = 1;

    for key in keys {
        if key.order() < last_order {
            return Err(FeaturizeError::ShapeMismatch(format!(
                "{}-body key {:?} follows a {}-body key",
                key.order(),
                key,
                last_order
            )));
        }
        last_order = key.order();
        match *key {
            InteractionKey::One(a) => one_body.push(sym(a)?),
            InteractionKey::Two(a, b) => two_body.push((sym(a)?, sym(b)?)),
            InteractionKey::Three(a, b, c) => three_body.push((sym(a)?, sym(b)?, sym(c)?)),
        }
    }

    let three_body = (!three_body.is_empty()).then_some(three_body);
    InteractionMap::new(one_body, two_body, three_body)
}
