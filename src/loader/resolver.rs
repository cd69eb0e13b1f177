//! Name resolution hook for hosts that look symbols up on demand

use crate::error::ShelfResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Something that can map a bare symbol name to the file defining it
///
/// Returning `Ok(None)` means "not mine": the host moves on to the next
/// resolver. Errors abort resolution.
pub trait SymbolResolver {
    /// Name of this resolver (for logging)
    fn name(&self) -> &str;

    fn resolve(&mut self, symbol: &str) -> ShelfResult<Option<PathBuf>>;
}

/// Host-side registry consulting resolvers in registration order
#[derive(Default)]
pub struct SymbolTable {
    resolvers: Vec<Box<dyn SymbolResolver>>,
    resolved: HashMap<String, PathBuf>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resolver: Box<dyn SymbolResolver>) {
        debug!("Registered symbol resolver: {}", resolver.name());
        self.resolvers.push(resolver);
    }

    /// Resolve `symbol`, remembering the answer for later lookups
    pub fn resolve(&mut self, symbol: &str) -> ShelfResult<Option<&Path>> {
        if !self.resolved.contains_key(symbol) {
            let mut found = None;
            for resolver in &mut self.resolvers {
                if let Some(path) = resolver.resolve(symbol)? {
                    debug!("{} resolved {} to {}", resolver.name(), symbol, path.display());
                    found = Some(path);
                    break;
                }
            }

            match found {
                Some(path) => {
                    self.resolved.insert(symbol.to_string(), path);
                }
                None => return Ok(None),
            }
        }

        Ok(self.resolved.get(symbol).map(PathBuf::as_path))
    }

    pub fn is_resolved(&self, symbol: &str) -> bool {
        self.resolved.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Fixed {
        symbol: &'static str,
        path: &'static str,
        calls: Rc<Cell<usize>>,
    }

    impl SymbolResolver for Fixed {
        fn name(&self) -> &str {
            self.symbol
        }

        fn resolve(&mut self, symbol: &str) -> ShelfResult<Option<PathBuf>> {
            self.calls.set(self.calls.get() + 1);
            Ok((symbol == self.symbol).then(|| PathBuf::from(self.path)))
        }
    }

    fn fixed(symbol: &'static str, path: &'static str) -> (Box<dyn SymbolResolver>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let resolver = Fixed {
            symbol,
            path,
            calls: Rc::clone(&calls),
        };
        (Box::new(resolver), calls)
    }

    #[test]
    fn first_matching_resolver_wins() {
        let mut table = SymbolTable::new();
        let (a, _) = fixed("Foo", "/a/Foo.class");
        let (b, b_calls) = fixed("Bar", "/b/Bar.class");
        table.register(a);
        table.register(b);

        assert_eq!(table.resolve("Foo").unwrap(), Some(Path::new("/a/Foo.class")));
        assert_eq!(b_calls.get(), 0);
        assert_eq!(table.resolve("Bar").unwrap(), Some(Path::new("/b/Bar.class")));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_symbol_is_not_an_error() {
        let mut table = SymbolTable::new();
        let (a, _) = fixed("Foo", "/a/Foo.class");
        table.register(a);

        assert_eq!(table.resolve("Missing").unwrap(), None);
        assert!(!table.is_resolved("Missing"));
    }

    #[test]
    fn resolved_symbols_are_remembered() {
        let mut table = SymbolTable::new();
        let (a, calls) = fixed("Foo", "/a/Foo.class");
        table.register(a);

        table.resolve("Foo").unwrap();
        table.resolve("Foo").unwrap();
        assert!(table.is_resolved("Foo"));
        assert_eq!(calls.get(), 1);
    }
}
