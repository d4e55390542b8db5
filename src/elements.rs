//! Element symbol <-> atomic number encoding.

use crate::error::{FeaturizeError, Result};

/// Element symbols ordered by atomic number; `SYMBOLS[z - 1]` is element `z`.
pub const SYMBOLS: [&str; 118] = [
    "H", "He", //
    "Li", "Be", "B", "C", "N", "O", "F", "Ne", //
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", //
    "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se",
    "Br", "Kr", //
    "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te",
    "I", "Xe", //
    "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm",
    "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At",
    "Rn", //
    "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", "Md", "No",
    "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Returns the atomic number of `symbol`. Matching is case-sensitive.
pub fn atomic_number(symbol: &str) -> Result<u8> {
    SYMBOLS
        .iter()
        .position(|&s| s == symbol)
        .map(|i| (i + 1) as u8)
        .ok_or_else(|| FeaturizeError::UnknownElement(symbol.to_string()))
}

/// Inverse of [`atomic_number`].
pub fn symbol(z: u8) -> Option<&'static str> {
    (z as usize).checked_sub(1).and_then(|i| SYMBOLS.get(i)).copied()
}
