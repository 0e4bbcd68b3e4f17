// Bidirectional mapping between model components and file symbols

pub use super::model::ComponentRef;
use std::collections::{BTreeMap, HashMap};

/// Errors raised while assigning symbols
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SymbolError {
    #[error("Duplicate symbol '{symbol}' already associated with another component")]
    Duplicate { symbol: String },

    #[error("Component already has symbol '{existing}'")]
    AlreadyLabeled { existing: String },
}

/// Symbols used for one written file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolMap {
    by_symbol: BTreeMap<String, ComponentRef>,
    by_component: HashMap<ComponentRef, String>,
    aliases: BTreeMap<String, ComponentRef>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `symbol` to `component`
    pub fn add_symbol(
        &mut self,
        component: impl Into<ComponentRef>,
        symbol: impl Into<String>,
    ) -> Result<(), SymbolError> {
        let component = component.into();
        let symbol = symbol.into();
        if let Some(existing) = self.by_component.get(&component) {
            return Err(SymbolError::AlreadyLabeled {
                existing: existing.clone(),
            });
        }
        if self.by_symbol.contains_key(&symbol) || self.aliases.contains_key(&symbol) {
            return Err(SymbolError::Duplicate { symbol });
        }
        self.by_symbol.insert(symbol.clone(), component);
        self.by_component.insert(component, symbol);
        Ok(())
    }

    /// Secondary name resolving to the same component
    pub fn add_alias(
        &mut self,
        component: impl Into<ComponentRef>,
        alias: impl Into<String>,
    ) -> Result<(), SymbolError> {
        let component = component.into();
        let alias = alias.into();
        match self
            .aliases
            .get(&alias)
            .or_else(|| self.by_symbol.get(&alias))
        {
            Some(existing) if *existing != component => {
                Err(SymbolError::Duplicate { symbol: alias })
            }
            Some(_) => Ok(()),
            None => {
                self.aliases.insert(alias, component);
                Ok(())
            }
        }
    }

    pub fn symbol(&self, component: impl Into<ComponentRef>) -> Option<&str> {
        self.by_component
            .get(&component.into())
            .map(String::as_str)
    }

    /// Resolve a symbol or an alias
    pub fn component(&self, symbol: &str) -> Option<ComponentRef> {
        self.by_symbol
            .get(symbol)
            .or_else(|| self.aliases.get(symbol))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Symbols in lexicographic order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ComponentRef)> {
        self.by_symbol
            .iter()
            .map(|(symbol, component)| (symbol.as_str(), *component))
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, ComponentRef)> {
        self.aliases
            .iter()
            .map(|(alias, component)| (alias.as_str(), *component))
    }
}

/// Produces the symbol a writer uses for a component
pub trait Labeler {
    fn label(&mut self, name: &str) -> String;
}

/// `x1`, `x2`, ... ignoring the component name
#[derive(Debug, Clone)]
pub struct NumericLabeler {
    prefix: String,
    next: usize,
}

impl NumericLabeler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Labeler for NumericLabeler {
    fn label(&mut self, _name: &str) -> String {
        let label = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        label
    }
}

/// Component names with characters the LP format rejects replaced
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLabeler;

impl Labeler for TextLabeler {
    fn label(&mut self, name: &str) -> String {
        name.chars()
            .map(|c| match c {
                '[' => '(',
                ']' => ')',
                ' ' | ':' => '_',
                other => other,
            })
            .collect()
    }
}

/// Component names reduced to `[A-Za-z0-9_]`
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaNumericLabeler;

impl Labeler for AlphaNumericLabeler {
    fn label(&mut self, name: &str) -> String {
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Model, Variable};

    #[test]
    fn symbols_resolve_both_ways() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        let y = model.add_var(Variable::new("y")).unwrap();

        let mut map = SymbolMap::new();
        map.add_symbol(x, "x1").unwrap();
        map.add_symbol(y, "x2").unwrap();
        map.add_alias(x, "__default_var").unwrap();

        assert_eq!(map.symbol(y), Some("x2"));
        assert_eq!(map.component("x1"), Some(ComponentRef::Var(x)));
        assert_eq!(map.component("__default_var"), Some(ComponentRef::Var(x)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let mut model = Model::new("m");
        let x = model.add_var(Variable::new("x")).unwrap();
        let y = model.add_var(Variable::new("y")).unwrap();

        let mut map = SymbolMap::new();
        map.add_symbol(x, "a").unwrap();
        assert_eq!(
            map.add_symbol(y, "a"),
            Err(SymbolError::Duplicate {
                symbol: "a".to_string()
            })
        );
        assert!(map.add_alias(y, "a").is_err());
    }

    #[test]
    fn labelers_sanitize_names() {
        assert_eq!(TextLabeler.label("y[1, a]"), "y(1,_a)");
        assert_eq!(AlphaNumericLabeler.label("b.y[1]"), "b_y_1_");

        let mut numeric = NumericLabeler::new("c");
        assert_eq!(numeric.label("anything"), "c1");
        assert_eq!(numeric.label("else"), "c2");
    }
}
