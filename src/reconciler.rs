//! Incremental reconciliation of a repeat region against its collection.

use std::{
    collections::{HashMap, VecDeque},
    fmt::{self, Debug},
    mem::take,
    rc::Rc,
};

use crate::{
    collections::{CollectionBinding, CollectionSink, Snapshot},
    core::{ComponentId, NotifyContext, RenderContext},
    dom::Node,
    instance::TemplateInstance,
    locals::{Changed, ItemLocals},
    template::RepeatBlock,
    utils::longest_increasing,
    Collection, CollectionKind, Diagnostic, Error, Locals, Value, ValueKey,
};

#[cfg(test)]
mod tests;

/// Identity of a render record.
///
/// Keyed maps use the mapping key.
/// Sequence items get an id minted when the item first appears.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum RecordKey {
    Seq(u64),
    Name(Rc<str>),
}

struct RenderRecord {
    key: RecordKey,
    value: Value,
    position: usize,
    item_locals: ItemLocals,
    instance: TemplateInstance,
}

struct RepeatSink {
    component: ComponentId,
}
impl CollectionSink for RepeatSink {
    fn notify(self: Rc<Self>, nc: &mut NotifyContext) {
        nc.request_update(self.component);
    }
}

/// Repeat region: one template instance per item of a collection, rendered after a marker comment.
pub struct Repeat {
    block: RepeatBlock,
    anchor: Node,
    sink: Option<Rc<RepeatSink>>,
    binding: Option<CollectionBinding>,
    kind: Option<CollectionKind>,
    records: Vec<RenderRecord>,
    next_id: u64,
    needs_reconcile: bool,
    is_failed: bool,
    is_destroyed: bool,
}

#[derive(Default)]
struct Summary {
    kept: usize,
    created: usize,
    destroyed: usize,
    moved: usize,
}

impl Repeat {
    pub(crate) fn new(block: RepeatBlock, anchor: Node) -> Self {
        Self {
            block,
            anchor,
            sink: None,
            binding: None,
            kind: None,
            records: Vec::new(),
            next_id: 0,
            needs_reconcile: false,
            is_failed: false,
            is_destroyed: false,
        }
    }

    pub fn block(&self) -> &RepeatBlock {
        &self.block
    }
    /// Marker comment after which the records are rendered.
    pub fn anchor(&self) -> &Node {
        &self.anchor
    }
    /// Collection currently observed by this region.
    pub fn collection(&self) -> Option<&Collection> {
        Some(self.binding.as_ref()?.collection())
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn is_destroyed(&self) -> bool {
        self.is_destroyed
    }

    /// Root nodes of all records, in order.
    pub fn nodes(&self) -> Vec<Node> {
        self.records
            .iter()
            .flat_map(|record| record.instance.nodes())
            .collect()
    }

    /// Evaluates the source and observes the resulting collection.
    ///
    /// Binding the collection already observed does nothing.
    /// On error the region is left unchanged.
    pub(crate) fn bind(&mut self, locals: &Locals, component: ComponentId) -> Result<(), Error> {
        if self.is_destroyed {
            tracing::trace!(anchor = %self.block.anchor, "bind of destroyed region ignored");
            return Ok(());
        }
        let value = self.block.source.eval(locals).map_err(Error::Source)?;
        let collection = Collection::from_value(&value)?;
        if self
            .binding
            .as_ref()
            .is_some_and(|b| b.collection().ptr_eq(&collection))
        {
            return Ok(());
        }
        let sink = match &self.sink {
            Some(sink) if sink.component == component => sink.clone(),
            _ => {
                let sink = Rc::new(RepeatSink { component });
                self.sink = Some(sink.clone());
                sink
            }
        };
        let sink: Rc<dyn CollectionSink> = sink;
        self.binding = Some(collection.bind(Rc::downgrade(&sink)));
        self.needs_reconcile = true;
        self.is_failed = false;
        Ok(())
    }

    /// Brings the records in line with the collection and the enclosing locals.
    pub(crate) fn refresh(&mut self, parent: &Locals, changed: &Changed, cx: &mut RenderContext) {
        if self.is_destroyed {
            tracing::trace!(anchor = %self.block.anchor, "refresh of destroyed region ignored");
            return;
        }
        let source_changed = changed.affects(self.block.source.reads());
        if source_changed || (self.binding.is_none() && !self.is_failed) {
            if let Err(error) = self.bind(parent, cx.component()) {
                cx.report(Diagnostic::Region {
                    anchor: self.block.anchor.clone(),
                    error,
                });
                self.clear();
                self.binding = None;
                self.kind = None;
                self.is_failed = true;
                return;
            }
        }
        let Some(binding) = &self.binding else {
            return;
        };
        let is_dirty = binding.take_dirty();
        if self.needs_reconcile || is_dirty {
            self.reconcile(parent, changed, cx);
        } else {
            for record in &mut self.records {
                if changed.is_empty() {
                    // nested regions may still be dirty
                    record.instance.refresh(changed, cx);
                    continue;
                }
                let locals = parent.push(record.item_locals.entries(&self.block.options.item));
                let own = record.instance.set_locals(locals.clone());
                let mut changed = changed.shadowed_by(&locals);
                changed.extend(own);
                record.instance.refresh(&changed, cx);
            }
        }
    }

    fn reconcile(&mut self, parent: &Locals, changed: &Changed, cx: &mut RenderContext) {
        let Some(binding) = &self.binding else {
            return;
        };
        self.needs_reconcile = false;
        let snapshot = binding.read();
        let kind = snapshot.kind();
        let length = snapshot.len();
        let mut summary = Summary::default();
        if self.kind != Some(kind) {
            summary.destroyed += self.records.len();
            self.clear();
            self.kind = Some(kind);
        }

        let (keys, values): (Vec<RecordKey>, Vec<Value>) = match snapshot {
            Snapshot::Sequence(values) => (self.sequence_keys(&values), values),
            Snapshot::KeyedMap(entries) => entries
                .into_iter()
                .map(|(name, value)| (RecordKey::Name(name), value))
                .unzip(),
        };

        let mut old: Vec<Option<RenderRecord>> = take(&mut self.records).into_iter().map(Some).collect();
        let old_index: HashMap<RecordKey, usize> = old
            .iter()
            .enumerate()
            .filter_map(|(i, r)| Some((r.as_ref()?.key.clone(), i)))
            .collect();

        let mut old_positions = Vec::with_capacity(length);
        let mut records = Vec::with_capacity(length);
        for (index, (key, value)) in keys.into_iter().zip(values).enumerate() {
            let item_locals = ItemLocals {
                item: value.clone(),
                index,
                length,
                key: match &key {
                    RecordKey::Name(name) => name.clone(),
                    RecordKey::Seq(_) => index.to_string().into(),
                },
            };
            let locals = parent.push(item_locals.entries(&self.block.options.item));
            let reused = old_index.get(&key).and_then(|&i| old[i].take());
            match reused {
                Some(mut record) => {
                    old_positions.push(Some(record.position));
                    let own = record.instance.set_locals(locals.clone());
                    let mut changed = changed.shadowed_by(&locals);
                    changed.extend(own);
                    record.instance.refresh(&changed, cx);
                    record.value = value;
                    record.position = index;
                    record.item_locals = item_locals;
                    records.push(record);
                    summary.kept += 1;
                }
                None => {
                    old_positions.push(None);
                    let mut instance = TemplateInstance::new(&self.block.template, locals);
                    instance.refresh(&Changed::All, cx);
                    records.push(RenderRecord {
                        key,
                        value,
                        position: index,
                        item_locals,
                        instance,
                    });
                    summary.created += 1;
                }
            }
        }
        for mut record in old.into_iter().flatten() {
            record.instance.destroy();
            summary.destroyed += 1;
        }

        let stays = longest_increasing(&old_positions);
        let mut cursor = self.anchor.clone();
        for (record, stay) in records.iter().zip(stays) {
            let nodes = record.instance.nodes();
            if !stay {
                cursor.after(&nodes);
                if old_positions[record.position].is_some() {
                    summary.moved += 1;
                }
            }
            if let Some(last) = nodes.last() {
                cursor = last.clone();
            }
        }
        self.records = records;
        tracing::debug!(
            anchor = %self.block.anchor,
            kept = summary.kept,
            created = summary.created,
            destroyed = summary.destroyed,
            moved = summary.moved,
            "reconcile"
        );
    }

    /// Keys of a sequence snapshot.
    ///
    /// An unchanged prefix keeps its keys.
    /// Each remaining item takes the key of the earliest unmatched previous record with an equal value,
    /// or a new key.
    fn sequence_keys(&mut self, values: &[Value]) -> Vec<RecordKey> {
        let prefix = self
            .records
            .iter()
            .zip(values)
            .take_while(|(record, value)| record.value == **value)
            .count();
        let mut keys: Vec<RecordKey> = self.records[..prefix]
            .iter()
            .map(|record| record.key.clone())
            .collect();
        let mut unmatched: HashMap<ValueKey, VecDeque<RecordKey>> = HashMap::new();
        for record in &self.records[prefix..] {
            unmatched
                .entry(record.value.key())
                .or_default()
                .push_back(record.key.clone());
        }
        for value in &values[prefix..] {
            let key = unmatched
                .get_mut(&value.key())
                .and_then(|keys| keys.pop_front())
                .unwrap_or_else(|| {
                    let key = RecordKey::Seq(self.next_id);
                    self.next_id += 1;
                    key
                });
            keys.push(key);
        }
        keys
    }

    fn clear(&mut self) {
        for mut record in self.records.drain(..) {
            record.instance.destroy();
        }
    }

    /// Destroys every record and stops observing the collection.
    pub(crate) fn destroy(&mut self) {
        if self.is_destroyed {
            tracing::trace!(anchor = %self.block.anchor, "region already destroyed");
            return;
        }
        self.clear();
        self.binding = None;
        self.is_destroyed = true;
    }
}
impl Debug for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeat")
            .field("anchor", &self.block.anchor)
            .field("len", &self.records.len())
            .field("kind", &self.kind)
            .finish()
    }
}
