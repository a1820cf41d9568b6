use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use common_types::{DebugImage, DebugMeta, Event};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    metric_consts::{DEBUG_ID_CACHE_REBUILDS, METADATA_CACHE_REBUILDS},
    stack::StackParser,
};

pub type ModuleMetadata = Map<String, Value>;

/// Build-time registrations, keyed by a raw stack string captured inside the
/// registering module. Only ever read here.
pub trait ModuleRegistry: Send + Sync {
    fn debug_ids(&self) -> Vec<(String, String)>;

    fn metadata(&self) -> Vec<(String, ModuleMetadata)>;

    /// Bumped on every write, so readers know when a cached projection is stale.
    fn version(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    debug_ids: RwLock<Vec<(String, String)>>,
    metadata: RwLock<Vec<(String, ModuleMetadata)>>,
    version: AtomicU64,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_debug_id(&self, stack: impl Into<String>, debug_id: impl Into<String>) {
        upsert(&self.debug_ids, stack.into(), debug_id.into());
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn register_metadata(&self, stack: impl Into<String>, metadata: ModuleMetadata) {
        upsert(&self.metadata, stack.into(), metadata);
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

fn upsert<V>(entries: &RwLock<Vec<(String, V)>>, key: String, value: V) {
    let mut entries = entries.write().unwrap();
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

impl ModuleRegistry for InMemoryRegistry {
    fn debug_ids(&self) -> Vec<(String, String)> {
        self.debug_ids.read().unwrap().clone()
    }

    fn metadata(&self) -> Vec<(String, ModuleMetadata)> {
        self.metadata.read().unwrap().clone()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

// A filename keyed projection of one registry table. `filenames` memoises the
// (comparatively expensive) stack parse of every raw key seen so far.
struct FilenameCache<V> {
    version: Option<u64>,
    filenames: HashMap<String, Option<String>>,
    map: Arc<HashMap<String, V>>,
}

impl<V> Default for FilenameCache<V> {
    fn default() -> Self {
        Self {
            version: None,
            filenames: HashMap::new(),
            map: Arc::new(HashMap::new()),
        }
    }
}

impl<V> FilenameCache<V> {
    fn get_or_rebuild(
        &mut self,
        version: u64,
        parser: &StackParser,
        entries: impl FnOnce() -> Vec<(String, V)>,
        rebuild_metric: &'static str,
    ) -> Arc<HashMap<String, V>> {
        if self.version == Some(version) {
            return self.map.clone();
        }

        let mut map = HashMap::new();
        for (stack, value) in entries() {
            let filename = self
                .filenames
                .entry(stack)
                .or_insert_with_key(|stack| {
                    parser
                        .parse(stack, 0, 0)
                        .into_iter()
                        .rev()
                        .find_map(|f| f.filename)
                });
            if let Some(filename) = filename {
                map.insert(filename.clone(), value);
            }
        }

        debug!(version, entries = map.len(), "rebuilt module cache");
        metrics::counter!(rebuild_metric).increment(1);

        self.version = Some(version);
        self.map = Arc::new(map);
        self.map.clone()
    }
}

/// Resolves frame filenames to build-time debug ids and module metadata, and
/// attaches them to (or strips them from) events.
pub struct FrameAnnotator {
    registry: Arc<dyn ModuleRegistry>,
    parser: StackParser,
    debug_ids: Mutex<FilenameCache<String>>,
    metadata: Mutex<FilenameCache<ModuleMetadata>>,
}

impl FrameAnnotator {
    pub fn new(registry: Arc<dyn ModuleRegistry>, parser: StackParser) -> Self {
        Self {
            registry,
            parser,
            debug_ids: Mutex::new(FilenameCache::default()),
            metadata: Mutex::new(FilenameCache::default()),
        }
    }

    pub fn filename_to_debug_id_map(&self) -> Arc<HashMap<String, String>> {
        let version = self.registry.version();
        self.debug_ids.lock().unwrap().get_or_rebuild(
            version,
            &self.parser,
            || self.registry.debug_ids(),
            DEBUG_ID_CACHE_REBUILDS,
        )
    }

    fn filename_to_metadata_map(&self) -> Arc<HashMap<String, ModuleMetadata>> {
        let version = self.registry.version();
        self.metadata.lock().unwrap().get_or_rebuild(
            version,
            &self.parser,
            || self.registry.metadata(),
            METADATA_CACHE_REBUILDS,
        )
    }

    pub fn metadata_for_filename(&self, filename: &str) -> Option<ModuleMetadata> {
        self.filename_to_metadata_map().get(filename).cloned()
    }

    /// Attaches module metadata to every frame that has a filename and no metadata yet.
    pub fn add_metadata_to_stack_frames(&self, event: &mut Event) {
        let metadata = self.filename_to_metadata_map();
        if metadata.is_empty() {
            return;
        }

        for frame in event.frames_mut() {
            if frame.module_metadata.is_some() {
                continue;
            }
            let Some(filename) = frame.filename.as_deref() else {
                continue;
            };
            if let Some(found) = metadata.get(filename) {
                frame.module_metadata = Some(found.clone());
            }
        }
    }

    pub fn apply_debug_ids(&self, event: &mut Event) {
        if !event.is_error_event() {
            return;
        }

        let debug_ids = self.filename_to_debug_id_map();
        for frame in event.frames_mut() {
            let Some(filename) = frame.filename.as_deref() else {
                continue;
            };
            if let Some(debug_id) = debug_ids.get(filename) {
                frame.debug_id = Some(debug_id.clone());
            }
        }
    }

    pub fn debug_images_for_resources(&self, paths: &[&str]) -> Vec<DebugImage> {
        let debug_ids = self.filename_to_debug_id_map();
        paths
            .iter()
            .filter(|path| !path.is_empty())
            .filter_map(|path| {
                debug_ids
                    .get(*path)
                    .map(|debug_id| DebugImage::sourcemap(*path, debug_id.as_str()))
            })
            .collect()
    }

    /// Forgets everything cached, including the parsed stack keys.
    pub fn clear(&self) {
        *self.debug_ids.lock().unwrap() = FilenameCache::default();
        *self.metadata.lock().unwrap() = FilenameCache::default();
    }
}

/// Module metadata is client local, and never leaves the process.
pub fn strip_metadata_from_stack_frames(event: &mut Event) {
    for frame in event.frames_mut() {
        frame.module_metadata = None;
    }
}

/// Moves the debug ids off the frames and into the event's debug images, one image per file.
pub fn apply_debug_meta(event: &mut Event) {
    let mut images = BTreeMap::new();

    for frame in event.frames_mut() {
        let Some(debug_id) = frame.debug_id.take() else {
            continue;
        };
        if let Some(code_file) = frame.abs_path.clone().or_else(|| frame.filename.clone()) {
            images.insert(code_file, debug_id);
        }
    }

    if images.is_empty() {
        return;
    }

    let debug_meta = event.debug_meta.get_or_insert_with(DebugMeta::default);
    debug_meta.images.extend(
        images
            .into_iter()
            .map(|(code_file, debug_id)| DebugImage::sourcemap(code_file, debug_id)),
    );
}

#[cfg(test)]
mod tests {
    use common_types::error_tracking::{Exception, StackFrame, Stacktrace};
    use serde_json::json;

    use super::*;
    use crate::stack::default_stack_parser;

    fn stack_for(filename: &str) -> String {
        format!("Error\n    at register ({filename}:1:1)\n    at init ({filename}:2:2)")
    }

    fn metadata(key: &str) -> ModuleMetadata {
        Map::from_iter([(key.to_string(), json!(true))])
    }

    fn event_with_frames(frames: Vec<StackFrame>) -> Event {
        Event::from_exceptions(vec![Exception {
            stacktrace: Some(Stacktrace::new(frames)),
            ..Exception::new("Error", "boom")
        }])
    }

    fn annotator(registry: &Arc<InMemoryRegistry>) -> FrameAnnotator {
        FrameAnnotator::new(registry.clone(), default_stack_parser())
    }

    #[test]
    fn test_debug_id_map_uses_filename_from_stack() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register_debug_id(stack_for("/app/bundle.js"), "debug-1");

        let map = annotator(&registry).filename_to_debug_id_map();

        assert_eq!(map.get("/app/bundle.js").map(String::as_str), Some("debug-1"));
    }

    #[test]
    fn test_cache_follows_registry_version() {
        let registry = Arc::new(InMemoryRegistry::new());
        let annotator = annotator(&registry);
        registry.register_debug_id(stack_for("/app/a.js"), "a");

        let first = annotator.filename_to_debug_id_map();
        let again = annotator.filename_to_debug_id_map();
        assert!(Arc::ptr_eq(&first, &again));

        registry.register_debug_id(stack_for("/app/b.js"), "b");
        let rebuilt = annotator.filename_to_debug_id_map();

        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(rebuilt.len(), 2);
        // Readers holding the old map keep a consistent view
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_metadata_round_trip() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register_metadata(stack_for("/app/a.js"), metadata("_sentryBundlerPluginAppKey:mine"));
        let annotator = annotator(&registry);

        let original = event_with_frames(vec![
            StackFrame::new("/app/a.js", "a").with_location(1, 1),
            StackFrame::new("/vendor/b.js", "b").with_location(2, 2),
        ]);
        let mut event = original.clone();

        annotator.add_metadata_to_stack_frames(&mut event);
        let frames = event.exceptions()[0].frames();
        assert!(frames[0].module_metadata.is_some());
        assert!(frames[1].module_metadata.is_none());

        strip_metadata_from_stack_frames(&mut event);
        assert_eq!(event, original);
    }

    #[test]
    fn test_existing_metadata_is_kept() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register_metadata(stack_for("/app/a.js"), metadata("new"));
        let annotator = annotator(&registry);

        let mut frame = StackFrame::new("/app/a.js", "a");
        frame.module_metadata = Some(metadata("old"));
        let mut event = event_with_frames(vec![frame]);

        annotator.add_metadata_to_stack_frames(&mut event);

        assert_eq!(
            event.exceptions()[0].frames()[0].module_metadata,
            Some(metadata("old"))
        );
    }

    #[test]
    fn test_debug_ids_move_into_debug_meta() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register_debug_id(stack_for("/app/a.js"), "debug-a");
        let annotator = annotator(&registry);

        let mut with_abs_path = StackFrame::new("/app/a.js", "a");
        with_abs_path.abs_path = Some("https://cdn.example.com/a.js".to_string());
        let mut event = event_with_frames(vec![with_abs_path, StackFrame::new("/app/a.js", "b")]);

        annotator.apply_debug_ids(&mut event);
        assert!(event.exceptions()[0]
            .frames()
            .iter()
            .all(|f| f.debug_id.as_deref() == Some("debug-a")));

        apply_debug_meta(&mut event);

        assert!(event.exceptions()[0].frames().iter().all(|f| f.debug_id.is_none()));
        assert_eq!(
            event.debug_meta.unwrap().images,
            vec![
                DebugImage::sourcemap("/app/a.js", "debug-a"),
                DebugImage::sourcemap("https://cdn.example.com/a.js", "debug-a"),
            ]
        );
    }

    #[test]
    fn test_debug_ids_skip_typed_events() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register_debug_id(stack_for("/app/a.js"), "debug-a");
        let annotator = annotator(&registry);

        let mut event = event_with_frames(vec![StackFrame::new("/app/a.js", "a")]);
        event.event_type = Some(common_types::EventType::Transaction);

        annotator.apply_debug_ids(&mut event);

        assert_eq!(event.exceptions()[0].frames()[0].debug_id, None);
    }

    #[test]
    fn test_debug_meta_untouched_without_debug_ids() {
        let mut event = event_with_frames(vec![StackFrame::new("/app/a.js", "a")]);
        apply_debug_meta(&mut event);
        assert_eq!(event.debug_meta, None);
    }

    #[test]
    fn test_debug_images_for_resources() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register_debug_id(stack_for("/app/a.js"), "debug-a");

        let images = annotator(&registry).debug_images_for_resources(&["/app/a.js", "", "/app/missing.js"]);

        assert_eq!(images, vec![DebugImage::sourcemap("/app/a.js", "debug-a")]);
    }

    #[test]
    fn test_clear_forces_rebuild() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.register_debug_id(stack_for("/app/a.js"), "debug-a");
        let annotator = annotator(&registry);

        let first = annotator.filename_to_debug_id_map();
        annotator.clear();
        let second = annotator.filename_to_debug_id_map();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }
}
