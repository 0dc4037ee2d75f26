//! Árbol de alcances.
//!
//! Cada procedimiento abre un alcance hijo del alcance en el que se
//! declara. Al salir de un procedimiento su alcance deja de estar activo
//! pero se conserva en el árbol, de forma que la forma de cada frame
//! (desplazamientos y tamaños) sigue disponible después del análisis.
//! Las tablas conservan el orden de inserción, del cual depende el orden
//! de los parámetros.

use indexmap::IndexMap;
use std::rc::Rc;
use tracing::debug;

use super::{
    types::{Type, MAX_SIZE},
    SemanticError,
};
use crate::{lex::Identifier, parse::Passing};

/// Índice de un alcance dentro de su árbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Variable,
    Param(Passing),
    Procedure,
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub of: Type,
    pub offset: u32,
    pub category: Category,
}

/// Resultado de una declaración exitosa.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declared {
    pub name: Rc<str>,
    pub size: u32,
    pub offset: u32,
}

pub struct Scope {
    name: Rc<str>,
    parent: Option<ScopeId>,
    symbols: IndexMap<Rc<str>, Symbol>,
    types: IndexMap<Rc<str>, Type>,
    children: Vec<ScopeId>,
    next_offset: u32,
}

impl Scope {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    /// Símbolos en orden de declaración.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.symbols.iter().map(|(name, symbol)| (name.as_ref(), symbol))
    }

    /// Total de unidades reservadas por las declaraciones del alcance.
    pub fn size(&self) -> u32 {
        self.next_offset
    }
}

pub struct ScopeTree {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl ScopeTree {
    /// Crea un árbol con únicamente el alcance global.
    pub fn new(name: &str) -> Self {
        let global = Scope {
            name: Rc::from(name),
            parent: None,
            symbols: IndexMap::new(),
            types: IndexMap::new(),
            children: Vec::new(),
            next_offset: 0,
        };

        ScopeTree {
            scopes: vec![global],
            current: ScopeId(0),
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Abre un alcance hijo del actual y lo activa.
    pub fn enter(&mut self, name: &str) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            name: Rc::from(name),
            parent: Some(self.current),
            symbols: IndexMap::new(),
            types: IndexMap::new(),
            children: Vec::new(),
            next_offset: 0,
        });

        self.scopes[self.current.0].children.push(id);
        self.current = id;

        id
    }

    /// Regresa al alcance padre. El alcance global nunca se abandona.
    pub fn exit(&mut self) {
        let scope = self.scope(self.current);
        debug!(scope = scope.name(), size = scope.size(), "exit scope");

        if let Some(parent) = scope.parent {
            self.current = parent;
        }
    }

    /// Declara un símbolo en el alcance actual.
    pub fn declare(
        &mut self,
        name: &Identifier,
        of: Type,
        category: Category,
    ) -> Result<Declared, SemanticError> {
        self.declare_in(self.current, name, of, category)
    }

    /// Declara un símbolo en un alcance específico.
    ///
    /// Un parámetro por referencia ocupa una unidad (una dirección),
    /// un procedimiento no ocupa espacio.
    pub fn declare_in(
        &mut self,
        scope: ScopeId,
        name: &Identifier,
        of: Type,
        category: Category,
    ) -> Result<Declared, SemanticError> {
        let scope = &mut self.scopes[scope.0];
        if scope.symbols.contains_key(name.as_ref()) {
            return Err(SemanticError::Duplicate(name.clone()));
        }

        let size = match category {
            Category::Variable | Category::Param(Passing::Value) => of.size(),
            Category::Param(Passing::Reference) => 1,
            Category::Procedure => 0,
        };

        let offset = scope.next_offset;
        let end = u64::from(offset) + u64::from(size);
        if end > u64::from(MAX_SIZE) {
            return Err(SemanticError::TooLarge(end));
        }

        scope.next_offset += size;

        let symbol = Symbol {
            of,
            offset,
            category,
        };

        scope.symbols.insert(name.name(), symbol);

        Ok(Declared {
            name: name.name(),
            size,
            offset,
        })
    }

    /// Busca un símbolo desde el alcance actual hacia afuera.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.lookup_from(self.current, name)
    }

    /// Busca un símbolo desde un alcance arbitrario hacia afuera.
    pub fn lookup_from(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.ancestry(scope)
            .find_map(|scope| self.scope(scope).symbols.get(name))
    }

    /// Busca un símbolo únicamente en el alcance actual.
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scope(self.current).symbols.get(name)
    }

    /// Registra un alias de tipo en el alcance actual.
    ///
    /// Ante un alias duplicado prevalece la primera definición.
    pub fn define_type(&mut self, name: &Identifier, of: Type) -> Result<(), SemanticError> {
        let types = &mut self.scopes[self.current.0].types;
        if types.contains_key(name.as_ref()) {
            return Err(SemanticError::DuplicateType(name.clone()));
        }

        types.insert(name.name(), of);
        Ok(())
    }

    /// Resuelve un alias de tipo desde el alcance actual hacia afuera.
    pub fn resolve_type(&self, name: &str) -> Option<&Type> {
        self.ancestry(self.current)
            .find_map(|scope| self.scope(scope).types.get(name))
    }

    fn ancestry(&self, from: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(from), move |scope| self.scope(*scope).parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::ArrayType;

    fn id(name: &str) -> Identifier {
        Identifier::new(name)
    }

    #[test]
    fn offsets_follow_declaration_order() {
        let mut tree = ScopeTree::new("p");
        let array = Type::Array(Rc::new(ArrayType {
            low: 0,
            high: 4,
            of: Type::INTEGER,
        }));

        let x = tree.declare(&id("x"), Type::INTEGER, Category::Variable).unwrap();
        let a = tree.declare(&id("a"), array.clone(), Category::Variable).unwrap();
        let y = tree.declare(&id("y"), Type::CHAR, Category::Variable).unwrap();

        assert_eq!((x.offset, x.size), (0, 1));
        assert_eq!((a.offset, a.size), (1, 5));
        assert_eq!((y.offset, y.size), (6, 1));

        tree.enter("f");
        let r = tree
            .declare(&id("r"), array, Category::Param(Passing::Reference))
            .unwrap();

        assert_eq!((r.offset, r.size), (0, 1));
    }

    #[test]
    fn duplicates_keep_first() {
        let mut tree = ScopeTree::new("p");
        tree.declare(&id("x"), Type::INTEGER, Category::Variable).unwrap();

        let error = tree.declare(&id("x"), Type::CHAR, Category::Variable).unwrap_err();
        assert!(matches!(error, SemanticError::Duplicate(_)));
        assert_eq!(tree.lookup("x").unwrap().of, Type::INTEGER);
        assert_eq!(tree.scope(tree.global()).size(), 1);
    }

    #[test]
    fn locals_vanish_after_exit() {
        let mut tree = ScopeTree::new("p");
        tree.declare(&id("g"), Type::INTEGER, Category::Variable).unwrap();

        let f = tree.enter("f");
        tree.declare(&id("local"), Type::INTEGER, Category::Variable).unwrap();
        assert!(tree.lookup("g").is_some());
        assert!(tree.lookup_local("g").is_none());
        assert!(tree.lookup("local").is_some());

        tree.exit();
        assert_eq!(tree.current(), tree.global());
        assert!(tree.lookup("local").is_none());

        // El alcance se conserva en el árbol
        assert!(tree.lookup_from(f, "local").is_some());
        assert_eq!(tree.scope(tree.global()).children(), &[f]);
    }
}
