//! Document aggregate: ordered pages, metadata, cursor and link graph.
//!
//! # Responsibility
//! - Own pages and route every page mutation so changes mark the document
//!   modified.
//! - Maintain tags and the page link table.
//! - Provide document-level search and JSON (de)serialization.
//!
//! # Invariants
//! - `id` is stable; `duplicate()` mints new document, page and object ids.
//! - Tags are unique and keep insertion order.
//! - Link targets per source are distinct and keep insertion order; entries
//!   pointing at deleted pages are tolerated and never pruned.
//! - `modified` is set by content changes and cleared only via
//!   `set_modified(false)` after a successful save.
//!
//! # See also
//! - storage for persistence of the serialized form.

use crate::model::event::ChangeEvent;
use crate::model::object::PageObject;
use crate::model::page::{Page, PageId};
use crate::model::schema::{
    format_timestamp, now_millis, parse_id, read_record, timestamp_or_now, SchemaResult,
};
use chrono::{DateTime, Utc};
use log::warn;
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

pub type DocumentId = Uuid;

pub const DEFAULT_DOCUMENT_TITLE: &str = "Untitled Document";
pub const FIRST_PAGE_TITLE: &str = "Page 1";
const COPY_SUFFIX: &str = " (Copy)";

#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    tags: Vec<String>,
    pages: Vec<Page>,
    current_page: Option<PageId>,
    links: BTreeMap<PageId, Vec<PageId>>,
    modified: bool,
    events: Vec<ChangeEvent>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.created_at == other.created_at
            && self.modified_at == other.modified_at
            && self.tags == other.tags
            && self.pages == other.pages
            && self.links == other.links
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DEFAULT_DOCUMENT_TITLE)
    }
}

impl Document {
    /// Creates a document seeded with one current page titled "Page 1".
    ///
    /// A new document has never been saved, so it starts modified.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_millis();
        let mut document = Self {
            id: Uuid::new_v4(),
            title: if title.is_empty() {
                DEFAULT_DOCUMENT_TITLE.to_string()
            } else {
                title
            },
            description: String::new(),
            created_at: now,
            modified_at: now,
            tags: Vec::new(),
            pages: Vec::new(),
            current_page: None,
            links: BTreeMap::new(),
            modified: false,
            events: Vec::new(),
        };
        document.create_new_page(FIRST_PAGE_TITLE);
        document.events.clear();
        document
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if self.title != title {
            self.title = title;
            self.record(ChangeEvent::DocumentTitleChanged {
                document_id: self.id,
            });
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        let description = description.into();
        if self.description != description {
            self.description = description;
            self.record(ChangeEvent::DocumentDescriptionChanged {
                document_id: self.id,
            });
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        if self.modified != modified {
            self.modified = modified;
            self.emit(ChangeEvent::ModifiedChanged { modified });
        }
    }

    /// Bumps the modification time and sets the modified flag.
    pub fn mark_modified(&mut self) {
        self.modified_at = now_millis();
        self.set_modified(true);
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_at(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_by_id(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|page| page.id() == id)
    }

    pub fn page_index(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|page| page.id() == id)
    }

    pub fn add_page(&mut self, page: Page) -> PageId {
        self.insert_page(self.pages.len(), page)
    }

    /// Inserts at `index` (clamped); the first page added becomes current.
    pub fn insert_page(&mut self, index: usize, mut page: Page) -> PageId {
        page.drain_events();
        let page_id = page.id();
        let index = index.min(self.pages.len());
        self.pages.insert(index, page);
        self.record(ChangeEvent::PageAdded { page_id, index });
        if self.current_page.is_none() {
            self.set_current_page(Some(page_id));
        }
        page_id
    }

    /// Appends a new page; an empty title becomes "Untitled Page".
    pub fn create_new_page(&mut self, title: impl Into<String>) -> PageId {
        self.add_page(Page::new(title))
    }

    pub fn remove_page(&mut self, id: PageId) -> Option<Page> {
        let index = self.page_index(id)?;
        self.remove_page_at(index)
    }

    /// Removes a page; if it was current, the previous page becomes current.
    pub fn remove_page_at(&mut self, index: usize) -> Option<Page> {
        if index >= self.pages.len() {
            return None;
        }
        let removed = self.pages.remove(index);
        self.record(ChangeEvent::PageRemoved {
            page_id: removed.id(),
            index,
        });
        if self.current_page == Some(removed.id()) {
            let next = self
                .pages
                .get(index.saturating_sub(1))
                .map(Page::id);
            self.set_current_page(next);
        }
        Some(removed)
    }

    pub fn clear_pages(&mut self) {
        if self.pages.is_empty() {
            return;
        }
        let removed = std::mem::take(&mut self.pages);
        for (index, page) in removed.iter().enumerate() {
            self.emit(ChangeEvent::PageRemoved {
                page_id: page.id(),
                index,
            });
        }
        self.set_current_page(None);
        self.mark_modified();
    }

    pub fn move_page(&mut self, from: usize, to: usize) -> bool {
        if from >= self.pages.len() || to >= self.pages.len() || from == to {
            return false;
        }
        let page = self.pages.remove(from);
        let page_id = page.id();
        self.pages.insert(to, page);
        self.record(ChangeEvent::PageMoved { page_id, from, to });
        true
    }

    /// Inserts a deep copy after `index` with fresh ids and a " (Copy)" title.
    pub fn duplicate_page(&mut self, index: usize) -> Option<PageId> {
        let source = self.pages.get(index)?;
        let mut copy = source.duplicate(false);
        copy.set_title(format!("{}{COPY_SUFFIX}", source.title()));
        Some(self.insert_page(index + 1, copy))
    }

    /// Runs `mutate` on one page and folds its change events into this
    /// document.
    pub fn with_page_mut<R>(&mut self, id: PageId, mutate: impl FnOnce(&mut Page) -> R) -> Option<R> {
        let page = self.pages.iter_mut().find(|page| page.id() == id)?;
        let result = mutate(page);
        let events = page.drain_events();
        self.absorb(events);
        Some(result)
    }

    pub fn with_current_page_mut<R>(&mut self, mutate: impl FnOnce(&mut Page) -> R) -> Option<R> {
        let id = self.current_page?;
        self.with_page_mut(id, mutate)
    }

    pub fn current_page_id(&self) -> Option<PageId> {
        self.current_page
    }

    /// Resolves the cursor; a cursor naming a foreign page yields `None`.
    pub fn current_page(&self) -> Option<&Page> {
        self.current_page.and_then(|id| self.page_by_id(id))
    }

    /// Moves the cursor. The id is not checked against owned pages.
    pub fn set_current_page(&mut self, page_id: Option<PageId>) {
        if self.current_page != page_id {
            self.current_page = page_id;
            self.emit(ChangeEvent::CurrentPageChanged { page_id });
        }
    }

    pub fn set_current_page_index(&mut self, index: usize) -> bool {
        match self.pages.get(index).map(Page::id) {
            Some(page_id) => {
                self.set_current_page(Some(page_id));
                true
            }
            None => false,
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if tag.is_empty() || self.has_tag(&tag) {
            return false;
        }
        self.tags.push(tag);
        self.record(ChangeEvent::TagsChanged {
            document_id: self.id,
        });
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let Some(index) = self.tags.iter().position(|existing| existing == tag) else {
            return false;
        };
        self.tags.remove(index);
        self.record(ChangeEvent::TagsChanged {
            document_id: self.id,
        });
        true
    }

    /// Replaces all tags, dropping empties and duplicates.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = unique_tags(tags.into_iter().map(Into::into));
        if self.tags != tags {
            self.tags = tags;
            self.record(ChangeEvent::TagsChanged {
                document_id: self.id,
            });
        }
    }

    pub fn links(&self) -> &BTreeMap<PageId, Vec<PageId>> {
        &self.links
    }

    /// Adds `from -> to`; returns `false` when the link already exists.
    pub fn add_link(&mut self, from: PageId, to: PageId) -> bool {
        let targets = self.links.entry(from).or_default();
        if targets.contains(&to) {
            return false;
        }
        targets.push(to);
        self.record(ChangeEvent::LinkAdded { from, to });
        true
    }

    pub fn remove_link(&mut self, from: PageId, to: PageId) -> bool {
        let Some(targets) = self.links.get_mut(&from) else {
            return false;
        };
        let Some(index) = targets.iter().position(|target| *target == to) else {
            return false;
        };
        targets.remove(index);
        if targets.is_empty() {
            self.links.remove(&from);
        }
        self.record(ChangeEvent::LinkRemoved { from, to });
        true
    }

    pub fn links_from(&self, from: PageId) -> &[PageId] {
        self.links.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sources linking to `page_id`, in source id order.
    pub fn get_backlinks(&self, page_id: PageId) -> Vec<PageId> {
        self.links
            .iter()
            .filter(|(_, targets)| targets.contains(&page_id))
            .map(|(source, _)| *source)
            .collect()
    }

    /// Pages whose title matches `query` as a case-insensitive regex, or
    /// whose text objects contain it as a plain substring.
    ///
    /// An invalid pattern matches no title but still searches content.
    pub fn search_pages(&self, query: &str) -> Vec<&Page> {
        let title_pattern = RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .ok();
        self.pages
            .iter()
            .filter(|page| {
                title_pattern
                    .as_ref()
                    .is_some_and(|pattern| pattern.is_match(page.title()))
                    || !page.find_objects_containing(query).is_empty()
            })
            .collect()
    }

    /// Text objects on any page containing `query`, ignoring case.
    pub fn search_objects(&self, query: &str) -> Vec<&PageObject> {
        self.pages
            .iter()
            .flat_map(|page| page.find_objects_containing(query))
            .collect()
    }

    /// Pages whose title contains `tag`, ignoring case.
    ///
    /// An empty tag is contained in every title and returns all pages.
    pub fn find_pages_by_tag(&self, tag: &str) -> Vec<&Page> {
        let needle = tag.to_lowercase();
        self.pages
            .iter()
            .filter(|page| page.title().to_lowercase().contains(&needle))
            .collect()
    }

    /// Whole-document copy with fresh ids; links and cursor are remapped.
    ///
    /// Page ids must change too: the store keys page rows by page id alone,
    /// so a copy reusing them could not be saved next to its source.
    pub fn duplicate(&self) -> Document {
        let mut id_map: HashMap<PageId, PageId> = HashMap::with_capacity(self.pages.len());
        let pages: Vec<Page> = self
            .pages
            .iter()
            .map(|page| {
                let copy = page.duplicate(false);
                id_map.insert(page.id(), copy.id());
                copy
            })
            .collect();
        let remap = |id: PageId| id_map.get(&id).copied().unwrap_or(id);
        let links: BTreeMap<PageId, Vec<PageId>> = self
            .links
            .iter()
            .map(|(source, targets)| {
                let targets = targets.iter().map(|target| remap(*target)).collect::<Vec<_>>();
                (remap(*source), targets)
            })
            .collect();

        let now = now_millis();
        Document {
            id: Uuid::new_v4(),
            title: format!("{}{COPY_SUFFIX}", self.title),
            description: self.description.clone(),
            created_at: now,
            modified_at: now,
            tags: self.tags.clone(),
            pages,
            current_page: self.current_page.map(remap),
            links,
            modified: true,
            events: Vec::new(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn to_json(&self) -> Value {
        self.write_json(false)
    }

    /// Snapshot including transient selection state.
    pub fn get_state(&self) -> Value {
        self.write_json(true)
    }

    /// Reads a stored document; the result starts unmodified.
    pub fn from_json(value: &Value) -> SchemaResult<Self> {
        Self::read_json(value, false)
    }

    /// Replaces the whole document with a snapshot and marks it modified.
    ///
    /// On error the document is left unchanged.
    pub fn set_state(&mut self, value: &Value) -> SchemaResult<()> {
        let restored = Self::read_json(value, true)?;
        let events = std::mem::take(&mut self.events);
        let modified = self.modified;
        *self = Self {
            events,
            modified,
            ..restored
        };
        self.emit(ChangeEvent::DocumentReloaded {
            document_id: self.id,
        });
        self.mark_modified();
        Ok(())
    }

    fn write_json(&self, with_state: bool) -> Value {
        let pages: Vec<Value> = self
            .pages
            .iter()
            .map(|page| {
                if with_state {
                    page.get_state()
                } else {
                    page.to_json()
                }
            })
            .collect();
        let mut links = Map::new();
        for (source, targets) in &self.links {
            let targets: Vec<String> = targets.iter().map(ToString::to_string).collect();
            links.insert(source.to_string(), json!(targets));
        }
        json!({
            "id": self.id.to_string(),
            "title": self.title,
            "description": self.description,
            "createdDate": format_timestamp(&self.created_at),
            "modifiedDate": format_timestamp(&self.modified_at),
            "tags": self.tags,
            "pages": pages,
            "links": links,
        })
    }

    fn read_json(value: &Value, with_state: bool) -> SchemaResult<Self> {
        let record: DocumentRecord = read_record("document", value)?;
        let id = parse_id("document.id", record.id.as_deref())?;

        let mut pages = Vec::with_capacity(record.pages.len());
        for page in &record.pages {
            let page = if with_state {
                let mut restored = Page::default();
                restored.set_state(page)?;
                restored.drain_events();
                restored
            } else {
                Page::from_json(page)?
            };
            pages.push(page);
        }

        let mut links: BTreeMap<PageId, Vec<PageId>> = BTreeMap::new();
        for (source, targets) in &record.links {
            let Ok(source_id) = Uuid::parse_str(source) else {
                warn!("event=document_read module=model status=skip document_id={id} error_code=invalid_link_source");
                continue;
            };
            let entry = links.entry(source_id).or_default();
            for target in targets {
                match Uuid::parse_str(target) {
                    Ok(target_id) if !entry.contains(&target_id) => entry.push(target_id),
                    Ok(_) => {}
                    Err(_) => warn!(
                        "event=document_read module=model status=skip document_id={id} error_code=invalid_link_target"
                    ),
                }
            }
            if entry.is_empty() {
                links.remove(&source_id);
            }
        }

        let current_page = pages.first().map(Page::id);
        Ok(Self {
            id,
            title: record
                .title
                .unwrap_or_else(|| DEFAULT_DOCUMENT_TITLE.to_string()),
            description: record.description,
            created_at: timestamp_or_now("createdDate", record.created_date.as_deref()),
            modified_at: timestamp_or_now("modifiedDate", record.modified_date.as_deref()),
            tags: unique_tags(record.tags.into_iter()),
            pages,
            current_page,
            links,
            modified: false,
            events: Vec::new(),
        })
    }

    /// Pushes a content event and marks the document modified.
    fn record(&mut self, event: ChangeEvent) {
        self.emit(event);
        self.mark_modified();
    }

    fn absorb(&mut self, events: Vec<ChangeEvent>) {
        let content_changed = events.iter().any(ChangeEvent::is_content_change);
        self.events.extend(events);
        if content_changed {
            self.mark_modified();
        }
    }

    fn emit(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }
}

fn unique_tags(tags: impl Iterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for tag in tags {
        if !tag.is_empty() && !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DocumentRecord {
    id: Option<String>,
    title: Option<String>,
    description: String,
    created_date: Option<String>,
    modified_date: Option<String>,
    tags: Vec<String>,
    pages: Vec<Value>,
    links: BTreeMap<String, Vec<String>>,
}
