//! Structural matching of parameter patterns against argument types.
//!
//! Matching only collects evidence: every place a parameter meets a
//! concrete type or value is recorded as a candidate. Whether the
//! candidates agree is decided afterwards, by ambiguity resolution for
//! call sites and by exact agreement for conformance matching.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use umbra_types::{ArrayLen, GenericArg, ParamRef, TypeData, TypeId, TypeInterner, ValueArg};

use crate::binding::{BindingSet, Bound};
use crate::decl::{DeclTable, GenericParam};
use crate::pack::packs_in;

pub(crate) struct Matcher<'a> {
    types: &'a TypeInterner,
    inferable: SmallVec<[ParamRef; 4]>,
    type_cands: FxHashMap<ParamRef, SmallVec<[TypeId; 2]>>,
    value_cands: FxHashMap<ParamRef, SmallVec<[ValueArg; 2]>>,
    /// `None` marks a pack element the pattern could not see through.
    pack_elems: FxHashMap<ParamRef, Vec<Option<TypeId>>>,
    /// Element types found for each pack while matching one element.
    frame: FxHashMap<ParamRef, TypeId>,
}

/// Why a list of arguments could not be aligned with a parameter list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct CountMismatch {
    pub expected: usize,
    pub found: usize,
}

impl<'a> Matcher<'a> {
    pub fn new(types: &'a TypeInterner, inferable: impl IntoIterator<Item = ParamRef>) -> Self {
        Matcher {
            types,
            inferable: inferable.into_iter().collect(),
            type_cands: FxHashMap::default(),
            value_cands: FxHashMap::default(),
            pack_elems: FxHashMap::default(),
            frame: FxHashMap::default(),
        }
    }

    fn is_inferable(&self, p: ParamRef) -> bool {
        self.inferable.contains(&p)
    }

    pub fn type_candidates(&self, p: ParamRef) -> Option<&[TypeId]> {
        self.type_cands.get(&p).map(SmallVec::as_slice)
    }

    pub fn value_candidates(&self, p: ParamRef) -> Option<&[ValueArg]> {
        self.value_cands.get(&p).map(SmallVec::as_slice)
    }

    /// Elements matched for a pack; `Err(())` if some element was not
    /// determined by its argument.
    pub fn pack_elements(&self, p: ParamRef) -> Option<Result<SmallVec<[TypeId; 4]>, ()>> {
        self.pack_elems
            .get(&p)
            .map(|elems| elems.iter().map(|e| e.ok_or(())).collect())
    }

    /// Align a parameter list (possibly ending in `expand` entries) with an
    /// argument list and match each pair. Pack parameters share the
    /// arguments left after the fixed ones equally.
    pub fn match_list(&mut self, params: &[TypeId], args: &[TypeId]) -> Result<(), CountMismatch> {
        let pack_params = params
            .iter()
            .filter(|&&p| matches!(self.types.lookup(p), TypeData::Expand(_)))
            .count();
        let fixed = params.len() - pack_params;
        if pack_params == 0 {
            if args.len() != params.len() {
                return Err(CountMismatch {
                    expected: params.len(),
                    found: args.len(),
                });
            }
        } else if args.len() < fixed || (args.len() - fixed) % pack_params != 0 {
            return Err(CountMismatch {
                expected: fixed,
                found: args.len(),
            });
        }
        let per_pack = if pack_params == 0 {
            0
        } else {
            (args.len() - fixed) / pack_params
        };

        let mut next = 0;
        for &param in params {
            if let TypeData::Expand(pattern) = self.types.lookup(param) {
                self.touch_packs(pattern);
                for &arg in &args[next..next + per_pack] {
                    self.match_element(pattern, arg);
                }
                next += per_pack;
            } else {
                self.match_type(param, args[next]);
                next += 1;
            }
        }
        Ok(())
    }

    /// A pack that appears in the parameter list has evidence even when no
    /// argument lands on it: it is empty.
    fn touch_packs(&mut self, pattern: TypeId) {
        for p in packs_in(self.types, pattern) {
            if self.is_inferable(p) {
                self.pack_elems.entry(p).or_default();
            }
        }
    }

    /// Match one argument against the element pattern of an `expand`.
    fn match_element(&mut self, pattern: TypeId, arg: TypeId) {
        let (arg, symbolic) = match self.types.lookup(arg) {
            TypeData::Expand(inner) => (inner, true),
            _ => (arg, false),
        };
        self.frame.clear();
        self.match_type(pattern, arg);
        for p in packs_in(self.types, pattern) {
            if !self.is_inferable(p) {
                continue;
            }
            let elem = self.frame.get(&p).map(|&e| {
                if symbolic {
                    self.types.expand(e)
                } else {
                    e
                }
            });
            self.pack_elems.entry(p).or_default().push(elem);
        }
    }

    pub fn match_type(&mut self, pattern: TypeId, actual: TypeId) {
        let types = self.types;
        if types.flags(pattern).is_concrete() || actual.is_error() {
            return;
        }
        match (types.lookup(pattern), types.lookup(actual)) {
            (TypeData::Param(p), _) => {
                if self.is_inferable(p) {
                    self.type_cands.entry(p).or_default().push(actual);
                }
            }
            (TypeData::Pack(p), _) => {
                self.frame.insert(p, actual);
            }
            (
                TypeData::Vector { elem, count },
                TypeData::Vector {
                    elem: actual_elem,
                    count: actual_count,
                },
            ) => {
                self.match_type(elem, actual_elem);
                self.match_value(count, actual_count);
            }
            (
                TypeData::Array { elem, len },
                TypeData::Array {
                    elem: actual_elem,
                    len: actual_len,
                },
            ) => {
                self.match_type(elem, actual_elem);
                if let (ArrayLen::Sized(v), ArrayLen::Sized(actual_v)) = (len, actual_len) {
                    self.match_value(v, actual_v);
                }
            }
            (TypeData::Tuple(elems), TypeData::Tuple(actual_elems)) => {
                // Tuple arity problems surface in the conversion check.
                let _ = self.match_list(&elems, &actual_elems);
            }
            (
                TypeData::Named { decl, args },
                TypeData::Named {
                    decl: actual_decl,
                    args: actual_args,
                },
            ) if decl == actual_decl => self.match_args(&args, &actual_args),
            (TypeData::Expand(pattern), TypeData::Expand(actual)) => {
                self.match_element(pattern, types.expand(actual));
            }
            _ => {}
        }
    }

    fn match_args(&mut self, args: &[GenericArg], actual: &[GenericArg]) {
        let mut next = 0;
        for (i, &arg) in args.iter().enumerate() {
            match arg {
                GenericArg::Type(ty) => {
                    if let TypeData::Expand(pattern) = self.types.lookup(ty) {
                        // Pack arguments come last: the rest are its elements.
                        let tail = args.len() - i - 1;
                        let end = actual.len().saturating_sub(tail);
                        self.touch_packs(pattern);
                        for &a in actual.get(next..end).unwrap_or(&[]) {
                            if let GenericArg::Type(a) = a {
                                self.match_element(pattern, a);
                            }
                        }
                        next = end;
                    } else if let Some(&GenericArg::Type(a)) = actual.get(next) {
                        self.match_type(ty, a);
                        next += 1;
                    } else {
                        next += 1;
                    }
                }
                GenericArg::Value(v) => {
                    if let Some(&GenericArg::Value(a)) = actual.get(next) {
                        self.match_value(v, a);
                    }
                    next += 1;
                }
            }
        }
    }

    pub fn match_value(&mut self, pattern: ValueArg, actual: ValueArg) {
        if let ValueArg::Param(p) = pattern {
            if self.is_inferable(p) && pattern != actual {
                self.value_cands.entry(p).or_default().push(actual);
            }
        }
    }

    /// Binding in which every candidate list agrees exactly; used when
    /// matching conformance and extension targets, where no promotion
    /// applies. `None` if a parameter is missing or conflicting.
    pub fn exact_binding(&self, table: &DeclTable, params: &[ParamRef]) -> Option<BindingSet> {
        let mut binding = BindingSet::new();
        for &p in params {
            let bound = match table.param(p)? {
                GenericParam::Type { .. } => {
                    let cands = self.type_candidates(p)?;
                    let first = *cands.first()?;
                    cands.iter().all(|&c| c == first).then_some(Bound::Type(first))?
                }
                GenericParam::Value { .. } => {
                    let cands = self.value_candidates(p)?;
                    let first = *cands.first()?;
                    cands.iter().all(|&c| c == first).then_some(Bound::Value(first))?
                }
                GenericParam::Pack { .. } => Bound::Pack(self.pack_elements(p)?.ok()?),
            };
            binding.bind(p, bound);
        }
        Some(binding)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use umbra_types::DeclId;

    use super::*;

    fn p(index: u32) -> ParamRef {
        ParamRef::new(DeclId::new(9), index)
    }

    #[test]
    fn collects_candidates_from_every_position() {
        let types = TypeInterner::new();
        let t = types.param(p(0));
        let mut m = Matcher::new(&types, [p(0)]);
        m.match_list(&[t, t], &[TypeId::INT16, TypeId::INT8]).ok();
        assert_eq!(
            m.type_candidates(p(0)),
            Some(&[TypeId::INT16, TypeId::INT8][..])
        );
    }

    #[test]
    fn array_lengths_feed_value_params() {
        let types = TypeInterner::new();
        let arr = types.array(TypeId::INT, ArrayLen::Sized(ValueArg::Param(p(0))));
        let mut m = Matcher::new(&types, [p(0)]);
        let (a7, a6) = (types.sized_array(TypeId::INT, 7), types.sized_array(TypeId::INT, 6));
        assert_eq!(m.match_list(&[arr, arr], &[a7, a6]), Ok(()));
        assert_eq!(
            m.value_candidates(p(0)),
            Some(&[ValueArg::Int(7), ValueArg::Int(6)][..])
        );
    }

    #[test]
    fn pack_absorbs_trailing_arguments() {
        let types = TypeInterner::new();
        let params = [TypeId::BOOL, types.expand(types.pack(p(0)))];
        let mut m = Matcher::new(&types, [p(0)]);
        m.match_list(&params, &[TypeId::BOOL, TypeId::INT, TypeId::FLOAT])
            .ok();
        let elems = m.pack_elements(p(0)).and_then(Result::ok);
        assert_eq!(
            elems.as_deref(),
            Some(&[TypeId::INT, TypeId::FLOAT][..])
        );
    }

    #[test]
    fn pack_without_arguments_is_empty() {
        let types = TypeInterner::new();
        let params = [types.expand(types.pack(p(0)))];
        let mut m = Matcher::new(&types, [p(0)]);
        assert_eq!(m.match_list(&params, &[]), Ok(()));
        assert_eq!(
            m.pack_elements(p(0)).and_then(Result::ok).map(|e| e.len()),
            Some(0)
        );
    }

    #[test]
    fn fixed_parameter_count_is_enforced() {
        let types = TypeInterner::new();
        let mut m = Matcher::new(&types, []);
        assert_eq!(
            m.match_list(&[TypeId::INT], &[TypeId::INT, TypeId::INT]),
            Err(CountMismatch {
                expected: 1,
                found: 2
            })
        );
    }
}
