//! Per-output-unit type aggregate
//!
//! The hand-off artifact from type resolution to the composer and the
//! emitters: everything one source file contributes to generated output,
//! discovered by walking service signatures. Built on demand per output
//! unit and not shared across units.

use std::collections::{BTreeMap, HashSet};

use crate::error::Error;
use crate::ir::{EnumId, FileId, MapId, MessageId, ServiceId, TypeRef};

use super::Resolver;

/// Types and services one source file contributes to generated output.
#[derive(Debug)]
pub struct TypesFile {
    /// The source file this aggregate was built for.
    pub file: FileId,
    /// Enums referenced from any reachable field.
    pub enums: Vec<EnumId>,
    /// Output object types, discovery order.
    pub objects: Vec<MessageId>,
    /// Input object types, deduplicated by identity.
    pub inputs: Vec<MessageId>,
    /// Map pair objects.
    pub maps: Vec<MapId>,
    /// Services declared in the file.
    pub services: Vec<ServiceId>,
}

impl TypesFile {
    /// Build the aggregate for one file.
    ///
    /// Also the point where per-message configuration is validated eagerly:
    /// a bad unwrap surfaces here, before any code is emitted.
    pub fn build(resolver: &Resolver<'_>, file_id: FileId) -> Result<Self, Error> {
        let set = resolver.set();
        let file = set.file(file_id);

        let mut out = Self {
            file: file_id,
            enums: Vec::new(),
            objects: Vec::new(),
            inputs: Vec::new(),
            maps: Vec::new(),
            services: Vec::new(),
        };
        let mut walker = Walker {
            resolver,
            seen_objects: HashSet::new(),
            seen_inputs: HashSet::new(),
            seen_enums: HashSet::new(),
            seen_maps: HashSet::new(),
        };

        // Validate configuration against every message up front.
        for index in 0..file.messages.len() {
            resolver.unwrap_target(set.message_id(file_id, index))?;
        }

        for (service_index, service) in file.services.iter().enumerate() {
            out.services.push(ServiceId {
                file: file_id,
                index: service_index as u32,
            });
            for method in &service.methods {
                walker.outputs(method.output, &mut out)?;
                walker.inputs(method.input, &mut out)?;
            }
        }

        Ok(out)
    }
}

impl TypesFile {
    fn empty(file: FileId) -> Self {
        Self {
            file,
            enums: Vec::new(),
            objects: Vec::new(),
            inputs: Vec::new(),
            maps: Vec::new(),
            services: Vec::new(),
        }
    }

    /// Redistribute discovered types to their owning files.
    ///
    /// Discovery walks service signatures and crosses file boundaries, so a
    /// root file's aggregate can hold messages owned by its imports. Each
    /// type must be emitted in its owner's output unit exactly once, even
    /// when several roots reach it.
    pub fn partition_by_owner(aggregates: Vec<Self>) -> Vec<Self> {
        let mut by_file: BTreeMap<FileId, Self> = BTreeMap::new();
        let mut seen_enums = HashSet::new();
        let mut seen_objects = HashSet::new();
        let mut seen_inputs = HashSet::new();
        let mut seen_maps = HashSet::new();
        let mut seen_services = HashSet::new();

        for aggregate in aggregates {
            for id in aggregate.enums {
                if seen_enums.insert(id) {
                    by_file
                        .entry(id.file())
                        .or_insert_with(|| Self::empty(id.file()))
                        .enums
                        .push(id);
                }
            }
            for id in aggregate.objects {
                if seen_objects.insert(id) {
                    by_file
                        .entry(id.file())
                        .or_insert_with(|| Self::empty(id.file()))
                        .objects
                        .push(id);
                }
            }
            for id in aggregate.inputs {
                if seen_inputs.insert(id) {
                    by_file
                        .entry(id.file())
                        .or_insert_with(|| Self::empty(id.file()))
                        .inputs
                        .push(id);
                }
            }
            for id in aggregate.maps {
                if seen_maps.insert(id) {
                    by_file
                        .entry(id.file())
                        .or_insert_with(|| Self::empty(id.file()))
                        .maps
                        .push(id);
                }
            }
            for id in aggregate.services {
                if seen_services.insert(id) {
                    by_file
                        .entry(id.file())
                        .or_insert_with(|| Self::empty(id.file()))
                        .services
                        .push(id);
                }
            }
        }

        by_file.into_values().collect()
    }
}

struct Walker<'a, 'r> {
    resolver: &'a Resolver<'r>,
    seen_objects: HashSet<MessageId>,
    seen_inputs: HashSet<MessageId>,
    seen_enums: HashSet<EnumId>,
    seen_maps: HashSet<MapId>,
}

impl Walker<'_, '_> {
    fn outputs(&mut self, id: MessageId, out: &mut TypesFile) -> Result<(), Error> {
        if !self.seen_objects.insert(id) {
            return Ok(());
        }
        let set = self.resolver.set();
        if let Some(field) = self.resolver.unwrap_target(id)? {
            let ty = field.ty.clone();
            return self.output_type(&ty, out);
        }
        if self.resolver.meaningful_fields(id).is_empty() {
            return Ok(());
        }
        out.objects.push(id);
        let field_types: Vec<TypeRef> = set
            .message(id)
            .fields
            .iter()
            .map(|f| f.ty.clone())
            .collect();
        for ty in &field_types {
            self.output_type(ty, out)?;
        }
        Ok(())
    }

    fn output_type(&mut self, ty: &TypeRef, out: &mut TypesFile) -> Result<(), Error> {
        match ty {
            TypeRef::Scalar(_) => Ok(()),
            TypeRef::Enum(id) => {
                if self.seen_enums.insert(*id) {
                    out.enums.push(*id);
                }
                Ok(())
            }
            TypeRef::Message(id) => self.outputs(*id, out),
            TypeRef::Map(id) => {
                if self.seen_maps.insert(*id) {
                    out.maps.push(*id);
                }
                let value = self.resolver.set().map(*id).value.clone();
                self.output_type(&value, out)
            }
            TypeRef::Array(element) => self.output_type(element, out),
        }
    }

    fn inputs(&mut self, id: MessageId, out: &mut TypesFile) -> Result<(), Error> {
        let mut discovered = Vec::new();
        self.resolver
            .collect_input_objects(id, &mut self.seen_inputs, &mut discovered)?;
        for input in &discovered {
            // Enums and maps inside input objects share the output pools.
            let field_types: Vec<TypeRef> = self
                .resolver
                .set()
                .message(*input)
                .fields
                .iter()
                .map(|f| f.ty.clone())
                .collect();
            for ty in &field_types {
                self.input_leaf(ty, out);
            }
        }
        out.inputs.extend(discovered);
        Ok(())
    }

    fn input_leaf(&mut self, ty: &TypeRef, out: &mut TypesFile) {
        match ty {
            TypeRef::Enum(id) => {
                if self.seen_enums.insert(*id) {
                    out.enums.push(*id);
                }
            }
            TypeRef::Map(id) => {
                if self.seen_maps.insert(*id) {
                    out.maps.push(*id);
                }
                let value = self.resolver.set().map(*id).value.clone();
                self.input_leaf(&value, out);
            }
            TypeRef::Array(element) => self.input_leaf(element, out),
            TypeRef::Scalar(_) | TypeRef::Message(_) => {}
        }
    }
}
