//! Per-label schema: field layout, record construction, and alteration.
//!
//! A [`Schema`] owns one [`FieldExtractor`] per field plus the secondary
//! indexes declared on the label. Every structural change (set, add, delete,
//! modify) rebuilds the extractors' layout through `refresh_layout`.

mod detached;
mod indexing;
mod persist;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::kv::KvTransaction;
use crate::options::{LayoutKind, StoreOptions, MAX_NUM_FIELDS};
use crate::storage::field::extractor::{
    empty_self_describing_record, plan_eager, EagerExtractor, EagerPlan, RecordLimits,
    SelfDescribingExtractor, SelfDescribingLayout,
};
use crate::storage::field::{codec, FieldData, FieldExtractor, FieldSpec, FieldType};
use crate::storage::index::{CompositeIndex, EdgeIndex, VertexIndex};
use crate::storage::record::Record;
use crate::types::{GraphRecordError, LabelId, Result};

pub use indexing::FullTextEntry;
pub use persist::{SCHEMA_MAGIC, SCHEMA_TABLE};

const LABEL_SIZE: usize = core::mem::size_of::<u16>();
const RESERVED_NAMES: [&str; 3] = ["SKIP", "SRC_ID", "DST_ID"];

/// Ordering of edges by their temporal field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TemporalOrder {
    /// Older edges first.
    #[default]
    Ascending,
    /// Newer edges first.
    Descending,
}

/// Allowed (source label, destination label) pair for an edge label.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeConstraint {
    /// Source vertex label.
    pub src_label: String,
    /// Destination vertex label.
    pub dst_label: String,
}

impl EdgeConstraint {
    /// Builds a constraint.
    pub fn new(src_label: impl Into<String>, dst_label: impl Into<String>) -> Self {
        Self {
            src_label: src_label.into(),
            dst_label: dst_label.into(),
        }
    }
}

/// Layout and indexes of one vertex or edge label.
#[derive(Debug)]
pub struct Schema {
    label: String,
    label_id: LabelId,
    is_vertex: bool,
    detached: bool,
    options: StoreOptions,
    fields: Vec<FieldExtractor>,
    name_to_idx: HashMap<String, usize>,
    eager_plan: Option<EagerPlan>,
    primary_field: Option<String>,
    temporal_field: Option<String>,
    temporal_order: TemporalOrder,
    edge_constraints: Vec<EdgeConstraint>,
    fulltext_fields: BTreeSet<String>,
    vertex_indexes: BTreeMap<String, VertexIndex>,
    edge_indexes: BTreeMap<String, EdgeIndex>,
    composite_indexes: BTreeMap<Vec<String>, CompositeIndex>,
}

impl Schema {
    /// Empty schema for `label`. Call [`Schema::set_schema`] to define fields.
    pub fn new(
        label: impl Into<String>,
        label_id: LabelId,
        is_vertex: bool,
        options: StoreOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            label: label.into(),
            label_id,
            is_vertex,
            detached: false,
            options,
            fields: Vec::new(),
            name_to_idx: HashMap::new(),
            eager_plan: None,
            primary_field: None,
            temporal_field: None,
            temporal_order: TemporalOrder::default(),
            edge_constraints: Vec::new(),
            fulltext_fields: BTreeSet::new(),
            vertex_indexes: BTreeMap::new(),
            edge_indexes: BTreeMap::new(),
            composite_indexes: BTreeMap::new(),
        })
    }

    /// Label name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Label id written at the start of records.
    pub fn label_id(&self) -> LabelId {
        self.label_id
    }

    /// Whether this is a vertex label.
    pub fn is_vertex(&self) -> bool {
        self.is_vertex
    }

    /// Options the schema was built with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Record layout strategy.
    pub fn layout(&self) -> LayoutKind {
        self.options.layout
    }

    /// Primary field of a vertex label.
    pub fn primary_field(&self) -> Option<&str> {
        self.primary_field.as_deref()
    }

    /// Temporal field of an edge label.
    pub fn temporal_field(&self) -> Option<&str> {
        self.temporal_field.as_deref()
    }

    /// Temporal ordering of an edge label.
    pub fn temporal_order(&self) -> TemporalOrder {
        self.temporal_order
    }

    /// Allowed endpoint label pairs; empty means unconstrained.
    pub fn edge_constraints(&self) -> &[EdgeConstraint] {
        &self.edge_constraints
    }

    /// Replaces the endpoint constraints.
    pub fn set_edge_constraints(&mut self, constraints: Vec<EdgeConstraint>) -> Result<()> {
        if self.is_vertex && !constraints.is_empty() {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: vertex labels cannot have edge constraints",
                self.label
            )));
        }
        self.edge_constraints = constraints;
        Ok(())
    }

    /// Whether an edge from `src_label` to `dst_label` is allowed.
    pub fn edge_allowed(&self, src_label: &str, dst_label: &str) -> bool {
        self.edge_constraints.is_empty()
            || self
                .edge_constraints
                .iter()
                .any(|c| c.src_label == src_label && c.dst_label == dst_label)
    }

    fn label_size(&self) -> usize {
        if self.options.label_in_record {
            LABEL_SIZE
        } else {
            0
        }
    }

    fn limits(&self) -> RecordLimits {
        RecordLimits::from(&self.options)
    }

    fn extractor_for(&self, spec: FieldSpec) -> FieldExtractor {
        match self.options.layout {
            LayoutKind::Eager => FieldExtractor::Eager(EagerExtractor::new(spec, self.limits())),
            LayoutKind::SelfDescribing => {
                FieldExtractor::SelfDescribing(SelfDescribingExtractor::new(spec, self.limits()))
            }
        }
    }

    fn check_field_count(&self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: a schema needs at least one field",
                self.label
            )));
        }
        if n > MAX_NUM_FIELDS {
            return Err(GraphRecordError::TooManyFields {
                given: n,
                max: MAX_NUM_FIELDS,
            });
        }
        Ok(())
    }

    fn check_new_field(&self, spec: &FieldSpec) -> Result<()> {
        if RESERVED_NAMES.contains(&spec.name.as_str()) {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: Property name cannot be \"SKIP\" or \"SRC_ID\" or \"DST_ID\"",
                self.label
            )));
        }
        if spec.name.is_empty() {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: Property name cannot be empty",
                self.label
            )));
        }
        Ok(())
    }

    /// Converts a declared default to the field's type, so it is stored in
    /// the exact form records and the schema blob use. A null default is
    /// the same as none.
    fn normalize_default(&self, spec: &mut FieldSpec) -> Result<()> {
        spec.default_value = match spec.default_value.take() {
            None | Some(FieldData::Null) => None,
            Some(data) => {
                let value = codec::coerce(spec.ty, &data, &spec.name)?;
                if let FieldData::String(_) | FieldData::Blob(_) = value {
                    let given = codec::to_bytes(&value).len();
                    if given > self.options.max_field_size {
                        return Err(GraphRecordError::DataSizeTooLarge {
                            max: self.options.max_field_size,
                            given,
                        });
                    }
                }
                Some(value)
            }
        };
        Ok(())
    }

    /// Stable reorder placing fixed-size fields first.
    fn fixed_first(specs: Vec<FieldSpec>) -> Vec<FieldSpec> {
        let (mut fixed, var): (Vec<_>, Vec<_>) = specs.into_iter().partition(|f| f.ty.is_fixed());
        fixed.extend(var);
        fixed
    }

    fn install(&mut self, specs: Vec<FieldSpec>) -> Result<()> {
        let specs = match self.options.layout {
            LayoutKind::Eager => Self::fixed_first(specs),
            LayoutKind::SelfDescribing => specs,
        };
        self.fields = specs
            .into_iter()
            .enumerate()
            .map(|(i, mut spec)| {
                spec.id = i as u16;
                self.extractor_for(spec)
            })
            .collect();
        self.refresh_layout()
    }

    /// Defines the fields and label-level metadata.
    ///
    /// Under the eager layout fixed-size fields are placed before variable
    /// ones; under the self-describing layout ids follow input order.
    pub fn set_schema(
        &mut self,
        is_vertex: bool,
        mut fields: Vec<FieldSpec>,
        primary: Option<&str>,
        temporal: Option<&str>,
        temporal_order: TemporalOrder,
        edge_constraints: Vec<EdgeConstraint>,
    ) -> Result<()> {
        if self.has_indexes() {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: drop all indexes before redefining the schema",
                self.label
            )));
        }
        self.check_field_count(fields.len())?;
        for spec in &mut fields {
            self.normalize_default(spec)?;
        }
        let mut seen = HashSet::new();
        for spec in &fields {
            self.check_new_field(spec)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(GraphRecordError::FieldAlreadyExists(spec.name.clone()));
            }
        }
        let find = |name: &str| fields.iter().find(|f| f.name == name);
        if let Some(p) = primary {
            if !is_vertex {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: edge labels have no primary field",
                    self.label
                )));
            }
            let spec = find(p).ok_or_else(|| GraphRecordError::FieldNotFound(p.to_owned()))?;
            if spec.optional {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: primary field [{p}] cannot be optional",
                    self.label
                )));
            }
        }
        if let Some(t) = temporal {
            if is_vertex {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: vertex labels have no temporal field",
                    self.label
                )));
            }
            let spec = find(t).ok_or_else(|| GraphRecordError::FieldNotFound(t.to_owned()))?;
            if !matches!(spec.ty, FieldType::Int64 | FieldType::DateTime) {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: temporal field [{t}] must be INT64 or DATETIME",
                    self.label
                )));
            }
        }
        self.is_vertex = is_vertex;
        self.primary_field = primary.map(str::to_owned);
        self.temporal_field = temporal.map(str::to_owned);
        self.temporal_order = temporal_order;
        self.set_edge_constraints(edge_constraints)?;
        let specs = fields
            .into_iter()
            .map(|mut f| {
                f.deleted = false;
                f
            })
            .collect();
        self.install(specs)?;
        debug!(
            label = %self.label,
            n_fields = self.fields.len(),
            layout = ?self.options.layout,
            "schema.set"
        );
        Ok(())
    }

    /// Recomputes positions, the name map, and derived field sets.
    pub fn refresh_layout(&mut self) -> Result<()> {
        let label_size = self.label_size();
        match self.options.layout {
            LayoutKind::Eager => {
                let specs: Vec<FieldSpec> = self.fields.iter().map(|f| f.spec().clone()).collect();
                let plan = plan_eager(&specs, label_size);
                for (i, (field, layout)) in self.fields.iter_mut().zip(&plan.layouts).enumerate() {
                    field.spec_mut().id = i as u16;
                    if let FieldExtractor::Eager(e) = field {
                        e.set_layout(*layout);
                    }
                }
                self.eager_plan = Some(plan);
            }
            LayoutKind::SelfDescribing => {
                let var_ids: Arc<[u16]> = self
                    .fields
                    .iter()
                    .filter(|f| !f.ty().is_fixed())
                    .map(FieldExtractor::id)
                    .collect();
                for (i, field) in self.fields.iter_mut().enumerate() {
                    if usize::from(field.id()) != i {
                        return Err(GraphRecordError::Corruption("field ids are not sequential"));
                    }
                    if let FieldExtractor::SelfDescribing(e) = field {
                        e.set_layout(SelfDescribingLayout {
                            label_size,
                            var_ids: Arc::clone(&var_ids),
                        });
                    }
                }
                self.eager_plan = None;
            }
        }

        self.name_to_idx.clear();
        for (i, field) in self.fields.iter().enumerate() {
            if field.is_deleted() {
                continue;
            }
            if self.name_to_idx.insert(field.name().to_owned(), i).is_some() {
                return Err(GraphRecordError::FieldAlreadyExists(field.name().to_owned()));
            }
        }

        let live = |name: &str| self.name_to_idx.contains_key(name);
        if self.vertex_indexes.keys().chain(self.edge_indexes.keys()).any(|n| !live(n.as_str()))
            || self.composite_indexes.keys().flatten().any(|n| !live(n.as_str()))
        {
            return Err(GraphRecordError::Corruption("index refers to a missing field"));
        }
        if self.is_vertex && !self.vertex_indexes.is_empty() {
            let primary_indexed = self
                .primary_field
                .as_ref()
                .is_some_and(|p| self.vertex_indexes.contains_key(p));
            if !primary_indexed {
                return Err(GraphRecordError::Corruption(
                    "vertex schema with indexes lacks an indexed primary field",
                ));
            }
        }
        let name_to_idx = &self.name_to_idx;
        self.fulltext_fields.retain(|n| name_to_idx.contains_key(n));
        Ok(())
    }

    /// Adds fields to the schema.
    ///
    /// Fields that are neither optional nor defaulted are rejected, since
    /// existing records could not supply a value for them.
    pub fn add_fields(&mut self, mut fields: Vec<FieldSpec>) -> Result<()> {
        for spec in &mut fields {
            self.normalize_default(spec)?;
        }
        let mut seen = HashSet::new();
        for spec in &fields {
            self.check_new_field(spec)?;
            if self.name_to_idx.contains_key(&spec.name) || !seen.insert(spec.name.as_str()) {
                return Err(GraphRecordError::FieldAlreadyExists(spec.name.clone()));
            }
            if !spec.optional && !spec.has_default() {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: new field [{}] must be optional or have a default value",
                    self.label, spec.name
                )));
            }
        }
        self.check_field_count(self.fields.len() + fields.len())?;
        let added = fields.len();
        let mut specs: Vec<FieldSpec> = self.fields.iter().map(|f| f.spec().clone()).collect();
        specs.extend(fields.into_iter().map(|mut f| {
            f.deleted = false;
            f
        }));
        self.install(specs)?;
        debug!(label = %self.label, added, "schema.add_fields");
        Ok(())
    }

    /// Removes fields and every index that covers them.
    ///
    /// The eager layout compacts the remaining fields; the self-describing
    /// layout keeps tombstones so existing records stay readable.
    pub fn del_fields(&mut self, txn: &mut dyn KvTransaction, names: &[&str]) -> Result<()> {
        for &name in names {
            self.field_index(name)?;
            let protected = if self.is_vertex {
                self.primary_field.as_deref()
            } else {
                self.temporal_field.as_deref()
            };
            if protected == Some(name) {
                return Err(GraphRecordError::FieldCannotBeDeleted(name.to_owned()));
            }
        }
        for &name in names {
            self.drop_indexes_on(txn, name)?;
            self.fulltext_fields.remove(name);
        }
        match self.options.layout {
            LayoutKind::Eager => {
                let specs = self
                    .fields
                    .iter()
                    .map(|f| f.spec().clone())
                    .filter(|s| !names.contains(&s.name.as_str()))
                    .collect();
                self.install(specs)?;
            }
            LayoutKind::SelfDescribing => {
                for &name in names {
                    let idx = self.field_index(name)?;
                    self.fields[idx].spec_mut().deleted = true;
                }
                self.refresh_layout()?;
            }
        }
        debug!(label = %self.label, deleted = names.len(), "schema.del_fields");
        Ok(())
    }

    /// Replaces the definitions of existing fields, matched by name.
    ///
    /// Indexes on modified fields are dropped. The self-describing layout
    /// keeps the field id and converts stored values on read, so a field may
    /// not move between fixed-size and variable-length types there.
    pub fn mod_fields(
        &mut self,
        txn: &mut dyn KvTransaction,
        mut fields: Vec<FieldSpec>,
    ) -> Result<()> {
        for spec in &mut fields {
            self.normalize_default(spec)?;
        }
        for spec in &fields {
            let idx = self.field_index(&spec.name)?;
            let current = self.fields[idx].spec();
            if self.options.layout == LayoutKind::SelfDescribing
                && current.ty.is_fixed() != spec.ty.is_fixed()
            {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: field [{}] cannot change between {} and {}",
                    self.label, spec.name, current.ty, spec.ty
                )));
            }
            self.check_index_droppable(&spec.name)?;
            if self.primary_field.as_deref() == Some(spec.name.as_str()) && spec.optional {
                return Err(GraphRecordError::InputError(format!(
                    "Label[{}]: primary field [{}] cannot be optional",
                    self.label, spec.name
                )));
            }
        }
        for spec in &fields {
            self.drop_indexes_on(txn, &spec.name)?;
            if spec.ty != FieldType::String {
                self.fulltext_fields.remove(&spec.name);
            }
        }
        let modified = fields.len();
        let mut specs: Vec<FieldSpec> = self.fields.iter().map(|f| f.spec().clone()).collect();
        for mut spec in fields {
            let idx = self.field_index(&spec.name)?;
            spec.id = specs[idx].id;
            spec.deleted = false;
            specs[idx] = spec;
        }
        self.install(specs)?;
        debug!(label = %self.label, modified, "schema.mod_fields");
        Ok(())
    }

    fn field_index(&self, name: &str) -> Result<usize> {
        self.name_to_idx
            .get(name)
            .copied()
            .ok_or_else(|| GraphRecordError::FieldNotFound(name.to_owned()))
    }

    /// Extractor of a live field.
    pub fn get_field_extractor(&self, name: &str) -> Result<&FieldExtractor> {
        self.field_index(name).map(|i| &self.fields[i])
    }

    /// Extractor by field id.
    pub fn get_field_extractor_by_id(&self, id: u16) -> Result<&FieldExtractor> {
        self.fields
            .get(usize::from(id))
            .filter(|f| !f.is_deleted())
            .ok_or_else(|| GraphRecordError::FieldNotFound(format!("#{id}")))
    }

    /// Id of a live field.
    pub fn get_field_id(&self, name: &str) -> Result<u16> {
        self.get_field_extractor(name).map(FieldExtractor::id)
    }

    /// Ids of several live fields.
    pub fn get_field_ids(&self, names: &[&str]) -> Result<Vec<u16>> {
        names.iter().map(|n| self.get_field_id(n)).collect()
    }

    /// Every field spec, tombstones included, in id order.
    pub fn get_field_specs(&self) -> Vec<FieldSpec> {
        self.fields.iter().map(|f| f.spec().clone()).collect()
    }

    /// Live field specs in id order.
    pub fn get_alive_field_specs(&self) -> Vec<FieldSpec> {
        self.alive().map(|f| f.spec().clone()).collect()
    }

    /// Number of live fields.
    pub fn num_fields(&self) -> usize {
        self.name_to_idx.len()
    }

    fn alive(&self) -> impl Iterator<Item = &FieldExtractor> {
        self.fields.iter().filter(|f| !f.is_deleted())
    }

    /// Marks a string field for full-text indexing, or clears the mark.
    pub fn mark_fulltext(&mut self, name: &str, enabled: bool) -> Result<()> {
        let ty = self.get_field_extractor(name)?.ty();
        if ty != FieldType::String {
            return Err(GraphRecordError::InputError(format!(
                "Label[{}]: only STRING fields can be full-text indexed, [{name}] is {ty}",
                self.label
            )));
        }
        if enabled {
            self.fulltext_fields.insert(name.to_owned());
        } else {
            self.fulltext_fields.remove(name);
        }
        Ok(())
    }

    /// Fields marked for full-text indexing.
    pub fn fulltext_fields(&self) -> impl Iterator<Item = &str> {
        self.fulltext_fields.iter().map(String::as_str)
    }

    /// `(name, text)` of every non-null full-text field in `record`.
    pub fn fulltext_values(&self, record: &Record) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for name in &self.fulltext_fields {
            let f = self.get_field_extractor(name)?;
            if !f.get_is_null(record)? {
                out.push((name.clone(), f.field_to_string(record)?));
            }
        }
        Ok(out)
    }

    /// A record with optional fields null and variable fields empty.
    pub fn create_empty_record(&self, size_hint: usize) -> Result<Record> {
        let label = self.options.label_in_record.then_some(self.label_id.0);
        match (&self.eager_plan, self.options.layout) {
            (Some(plan), LayoutKind::Eager) => plan.empty_record(label, size_hint),
            (_, LayoutKind::SelfDescribing) => empty_self_describing_record(
                &self.get_field_specs(),
                self.label_size(),
                label,
                size_hint,
            ),
            (None, LayoutKind::Eager) => Err(GraphRecordError::Invalid("schema has no fields")),
        }
    }

    /// Label id stored at the start of `record`.
    pub fn record_label(&self, record: &Record) -> Result<LabelId> {
        if !self.options.label_in_record {
            return Err(GraphRecordError::Invalid("records do not carry a label id"));
        }
        record.read_u16(0).map(LabelId)
    }

    /// Rewrites a self-describing record so it holds a slot for every field.
    ///
    /// Values carry over; fields the record predates take their default.
    fn upgrade_record(&self, record: &Record) -> Result<Record> {
        let mut out = self.create_empty_record(record.len())?;
        for field in self.alive() {
            if field.get_is_null(record)? {
                continue;
            }
            let bytes = field.get_const_ref(record)?;
            field.write_value(&mut out, &bytes)?;
            field.write_null_bit(&mut out, false)?;
        }
        debug!(label = %self.label, from = record.len(), to = out.len(), "schema.upgrade_record");
        Ok(out)
    }

    fn ensure_present(&self, record: &mut Record, field: &FieldExtractor) -> Result<()> {
        if !field.data_in_record(record)? {
            *record = self.upgrade_record(record)?;
        }
        Ok(())
    }

    /// Sets `name` to `data`, upgrading the record first if it predates the field.
    pub fn parse_and_set(&self, record: &mut Record, name: &str, data: &FieldData) -> Result<()> {
        let field = self.get_field_extractor(name)?;
        self.ensure_present(record, field)?;
        field.parse_and_set(record, data)
    }

    /// Parses `input` into `name`, upgrading the record first if needed.
    pub fn parse_and_set_str(&self, record: &mut Record, name: &str, input: &str) -> Result<()> {
        let field = self.get_field_extractor(name)?;
        self.ensure_present(record, field)?;
        field.parse_and_set_str(record, input)
    }

    /// Typed value of `field` with defaults applied; null when unset.
    pub fn get_field_data_from_field(
        &self,
        field: &FieldExtractor,
        record: &Record,
    ) -> Result<FieldData> {
        field.get_copy(record)
    }

    /// Typed value of the field named `name`.
    pub fn get_field_data(&self, record: &Record, name: &str) -> Result<FieldData> {
        self.get_field_data_from_field(self.get_field_extractor(name)?, record)
    }

    /// Builds a record from `(name, value)` pairs; unnamed fields take their
    /// default, or null.
    pub fn build_record(&self, values: &[(&str, FieldData)]) -> Result<Record> {
        let mut record = self.create_empty_record(0)?;
        let mut given = HashSet::new();
        for (name, value) in values {
            self.parse_and_set(&mut record, name, value)?;
            given.insert(*name);
        }
        for field in self.alive().filter(|f| !given.contains(f.name())) {
            match &field.spec().default_value {
                Some(default) => field.parse_and_set(&mut record, default)?,
                None if !field.is_optional() && field.ty().is_fixed() => {
                    return Err(GraphRecordError::FieldCannotBeNull(field.name().to_owned()))
                }
                None => {}
            }
        }
        Ok(record)
    }

    /// `{name=value, ...}` over live fields.
    pub fn dump_record(&self, record: &Record) -> Result<String> {
        let parts = self
            .alive()
            .map(|f| Ok(format!("{}={}", f.name(), f.field_to_string(record)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("{{{}}}", parts.join(", ")))
    }

    /// Re-encodes a record written under `old` into this schema's layout.
    ///
    /// Fields are matched by name. New fields take their default or null;
    /// a new non-optional field without default fails.
    pub fn migrate_record(&self, old: &Schema, record: &Record) -> Result<Record> {
        let mut out = self.create_empty_record(record.len())?;
        for field in self.alive() {
            match old.get_field_extractor(field.name()) {
                Ok(src) => field.copy_from(&mut out, src, record)?,
                Err(GraphRecordError::FieldNotFound(_)) => match &field.spec().default_value {
                    Some(default) => field.parse_and_set(&mut out, default)?,
                    None if field.is_optional() => {}
                    None => {
                        return Err(GraphRecordError::FieldCannotBeNull(field.name().to_owned()))
                    }
                },
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Copies the named fields from `src` (laid out by `src_schema`) into `dst`.
    pub fn copy_fields_raw(
        &self,
        dst: &mut Record,
        names: &[&str],
        src_schema: &Schema,
        src: &Record,
    ) -> Result<()> {
        for &name in names {
            let dst_field = self.get_field_extractor(name)?;
            let src_field = src_schema.get_field_extractor(name)?;
            self.ensure_present(dst, dst_field)?;
            dst_field.copy_from(dst, src_field, src)?;
        }
        Ok(())
    }
}
