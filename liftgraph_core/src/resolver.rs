//! Batched resolution of references into typed domain objects.
//!
//! Every resolve call follows the same shape: dedupe the inputs, validate
//! them (keeping diagnostics), group the valid ones by `(kind, authority)`,
//! issue one fetch per group concurrently, keep the newest version of each
//! address, then parse. Templates take exactly two rounds: templates first,
//! then every nested exercise in one batch.

use crate::config::Config;
use crate::memo::CacheStatsSnapshot;
use crate::parser::RecordParser;
use crate::provider::{Filter, RecordProvider};
use crate::reference::{Reference, ReferenceDiagnostic};
use crate::strategy::{FetchOptions, StrategySelector};
use crate::types::{Collection, Exercise, RawRecord, RecordKind, Template, WorkoutRecord};
use crate::{Error, Result};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Resolved objects plus diagnostics for inputs that could not be used.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub items: Vec<T>,
    pub diagnostics: Vec<ReferenceDiagnostic>,
}

impl<T> Default for Resolved<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TemplateResolution {
    pub templates: Vec<Template>,
    /// Every exercise referenced by any resolved template.
    pub exercises: Vec<Exercise>,
    pub diagnostics: Vec<ReferenceDiagnostic>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CollectionContent {
    pub exercises: Vec<Exercise>,
    pub templates: Vec<Template>,
    pub diagnostics: Vec<ReferenceDiagnostic>,
}

/// One template with the exercises it plans.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SingleTemplate {
    pub template: Template,
    pub exercises: Vec<Exercise>,
    /// Template entries skipped because their exercise reference was unusable.
    pub diagnostics: Vec<ReferenceDiagnostic>,
    pub elapsed_ms: u64,
}

impl SingleTemplate {
    /// The resolved exercise a template entry points at, if it was found.
    pub fn exercise_for(&self, reference: &Reference) -> Option<&Exercise> {
        self.exercises
            .iter()
            .find(|e| e.reference().as_ref() == Some(reference))
    }
}

/// Deduped, validated references with diagnostics for the rejected inputs.
struct Checked {
    references: Vec<Reference>,
    diagnostics: Vec<ReferenceDiagnostic>,
}

fn check_references<S: AsRef<str>>(inputs: &[S]) -> Checked {
    let mut seen = HashSet::new();
    let mut checked = Checked {
        references: Vec::new(),
        diagnostics: Vec::new(),
    };

    for input in inputs {
        let input = input.as_ref();
        if !seen.insert(input) {
            continue;
        }
        match Reference::parse(input) {
            Ok(reference) => checked.references.push(reference),
            Err(error) => {
                if matches!(error, crate::reference::ReferenceError::CorruptedIdentifier { .. }) {
                    tracing::warn!("Corrupted reference {}: {}", input, error);
                } else {
                    tracing::debug!("Skipping invalid reference {}: {}", input, error);
                }
                checked
                    .diagnostics
                    .push(ReferenceDiagnostic::new(input, &error));
            }
        }
    }
    checked
}

fn require_kind(references: &[Reference], expected: RecordKind) -> Result<()> {
    match references.iter().find(|r| r.kind() != expected) {
        Some(wrong) => Err(Error::Contract(format!(
            "{} resolution was given a {} reference: {}",
            expected,
            wrong.kind(),
            wrong
        ))),
        None => Ok(()),
    }
}

/// Diagnostics for every template entry that was skipped while parsing.
fn entry_diagnostics(templates: &[Template]) -> impl Iterator<Item = ReferenceDiagnostic> + '_ {
    templates
        .iter()
        .flat_map(|t| t.invalid_entries.iter().cloned())
}

/// Stable dedupe, first occurrence wins.
fn dedup_references<'a, I>(references: I) -> Vec<Reference>
where
    I: IntoIterator<Item = &'a Reference>,
{
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter(|r| seen.insert(*r))
        .cloned()
        .collect()
}

/// Resolves references through a strategy selector, owning its parse cache.
pub struct ReferenceResolver {
    selector: StrategySelector,
    parser: RecordParser,
    options: FetchOptions,
}

impl ReferenceResolver {
    pub fn new(provider: Arc<dyn RecordProvider>) -> Self {
        Self::from_parts(
            StrategySelector::new(provider),
            RecordParser::default(),
            FetchOptions::default(),
        )
    }

    /// Resolver with parse cache size, deadlines and strategy from config.
    pub fn from_config(provider: Arc<dyn RecordProvider>, config: &Config) -> Self {
        let selector =
            StrategySelector::new(provider).with_probe_timeout(config.fetch.probe_timeout());
        Self::from_parts(
            selector,
            RecordParser::new(config.cache.parse_cache_capacity),
            config.fetch.options(),
        )
    }

    pub fn from_parts(selector: StrategySelector, parser: RecordParser, options: FetchOptions) -> Self {
        Self {
            selector,
            parser,
            options,
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    pub fn parser(&self) -> &RecordParser {
        &self.parser
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn parse_cache_stats(&self) -> CacheStatsSnapshot {
        self.parser.stats()
    }

    /// Resolve exercise references. Missing records are omitted.
    ///
    /// Fails with `Error::Contract` if any valid reference is not an exercise
    /// reference, and with a provider error if any group's fetch fails.
    pub async fn resolve_exercises<S: AsRef<str>>(&self, references: &[S]) -> Result<Resolved<Exercise>> {
        let checked = check_references(references);
        require_kind(&checked.references, RecordKind::Exercise)?;

        let items = self.exercises_for(&checked.references).await?;
        Ok(Resolved {
            items,
            diagnostics: checked.diagnostics,
        })
    }

    /// Resolve template references and, in one further round, every
    /// exercise those templates plan.
    pub async fn resolve_templates<S: AsRef<str>>(&self, references: &[S]) -> Result<TemplateResolution> {
        let checked = check_references(references);
        require_kind(&checked.references, RecordKind::Template)?;

        let templates = self.templates_for(&checked.references).await?;
        let nested = dedup_references(templates.iter().flat_map(|t| t.exercise_references()));
        let exercises = self.exercises_for(&nested).await?;

        let mut diagnostics = checked.diagnostics;
        diagnostics.extend(entry_diagnostics(&templates));
        Ok(TemplateResolution {
            templates,
            exercises,
            diagnostics,
        })
    }

    /// Resolve what a collection points at: its templates, then its direct
    /// exercises together with the templates' exercises in a single round.
    pub async fn resolve_collection_content(&self, collection: &Collection) -> Result<CollectionContent> {
        let template_refs = dedup_references(collection.references_of(RecordKind::Template));
        let templates = self.templates_for(&template_refs).await?;

        let exercise_refs = dedup_references(
            collection
                .references_of(RecordKind::Exercise)
                .chain(templates.iter().flat_map(|t| t.exercise_references())),
        );
        let exercises = self.exercises_for(&exercise_refs).await?;

        let skipped = collection
            .references_of(RecordKind::Collection)
            .count();
        if skipped > 0 {
            tracing::debug!(
                "Collection {} links {} nested collections; not expanded",
                collection.id,
                skipped
            );
        }

        let mut diagnostics = collection.invalid_references.clone();
        diagnostics.extend(entry_diagnostics(&templates));
        Ok(CollectionContent {
            exercises,
            templates,
            diagnostics,
        })
    }

    /// Resolve one template and its exercises, timing the whole operation.
    ///
    /// An unparseable reference is reported as not found.
    pub async fn resolve_single_template(&self, reference: &str) -> Result<Option<SingleTemplate>> {
        let started = Instant::now();
        let reference = match Reference::parse(reference) {
            Ok(reference) => reference,
            Err(error) => {
                tracing::warn!("Cannot resolve template {}: {}", reference, error);
                return Ok(None);
            }
        };
        require_kind(std::slice::from_ref(&reference), RecordKind::Template)?;
        self.single_template(&reference, started).await
    }

    /// The template a completed workout was performed from, if any.
    pub async fn resolve_workout_template(&self, record: &WorkoutRecord) -> Result<Option<SingleTemplate>> {
        match &record.template {
            Some(reference) => self.single_template(reference, Instant::now()).await,
            None => Ok(None),
        }
    }

    /// The newest version of a collection.
    pub async fn resolve_collection(&self, reference: &str) -> Result<Option<Collection>> {
        let reference = match Reference::parse(reference) {
            Ok(reference) => reference,
            Err(error) => {
                tracing::warn!("Cannot resolve collection {}: {}", reference, error);
                return Ok(None);
            }
        };
        require_kind(std::slice::from_ref(&reference), RecordKind::Collection)?;

        let mut collections = Vec::new();
        for raw in self.fetch_latest(std::slice::from_ref(&reference)).await? {
            collections.extend(self.parser.parse_collection(&raw)?);
        }
        Ok(collections.into_iter().next())
    }

    /// Fetch the newest version of a collection, then its content.
    pub async fn resolve_collection_by_ref(
        &self,
        reference: &str,
    ) -> Result<Option<(Collection, CollectionContent)>> {
        match self.resolve_collection(reference).await? {
            Some(collection) => {
                let content = self.resolve_collection_content(&collection).await?;
                Ok(Some((collection, content)))
            }
            None => Ok(None),
        }
    }

    async fn single_template(&self, reference: &Reference, started: Instant) -> Result<Option<SingleTemplate>> {
        let template = match self
            .templates_for(std::slice::from_ref(reference))
            .await?
            .into_iter()
            .next()
        {
            Some(template) => template,
            None => return Ok(None),
        };

        let exercise_refs = dedup_references(template.exercise_references());
        let exercises = self.exercises_for(&exercise_refs).await?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::debug!(
            "Resolved template {} with {} exercises in {}ms",
            reference,
            exercises.len(),
            elapsed_ms
        );
        let diagnostics = template.invalid_entries.clone();
        Ok(Some(SingleTemplate {
            template,
            exercises,
            diagnostics,
            elapsed_ms,
        }))
    }

    async fn exercises_for(&self, references: &[Reference]) -> Result<Vec<Exercise>> {
        let mut exercises = Vec::new();
        for raw in self.fetch_latest(references).await? {
            exercises.extend(self.parser.parse_exercise(&raw)?);
        }
        Ok(exercises)
    }

    async fn templates_for(&self, references: &[Reference]) -> Result<Vec<Template>> {
        let mut templates = Vec::new();
        for raw in self.fetch_latest(references).await? {
            templates.extend(self.parser.parse_template(&raw)?);
        }
        Ok(templates)
    }

    /// One fetch per `(kind, authority)` group, run concurrently; returns the
    /// newest record for each requested address, in request order.
    async fn fetch_latest(&self, references: &[Reference]) -> Result<Vec<RawRecord>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups: Vec<Filter> = Vec::new();
        let mut group_index: HashMap<(RecordKind, &str), usize> = HashMap::new();
        for reference in references {
            let key = (reference.kind(), reference.authority());
            let index = *group_index.entry(key).or_insert_with(|| {
                groups.push(
                    Filter::new()
                        .kind(reference.kind())
                        .author(reference.authority()),
                );
                groups.len() - 1
            });
            groups[index]
                .identifiers
                .insert(reference.identifier().to_string());
        }

        tracing::debug!(
            "Resolving {} references in {} batched fetches",
            references.len(),
            groups.len()
        );

        // max_results is a listing control; a resolve must see every match.
        let options = FetchOptions {
            max_results: None,
            ..self.options
        };
        let batches = try_join_all(groups.iter().map(|filter| {
            self.selector
                .fetch(std::slice::from_ref(filter), &options)
        }))
        .await?;

        let wanted: HashSet<&Reference> = references.iter().collect();
        let mut newest: HashMap<Reference, RawRecord> = HashMap::new();
        for record in batches.into_iter().flatten() {
            let address = match record.address() {
                Some(address) if wanted.contains(&address) => address,
                _ => continue,
            };
            let replace = newest
                .get(&address)
                .map_or(true, |current| record.supersedes(current));
            if replace {
                newest.insert(address, record);
            }
        }

        Ok(references
            .iter()
            .filter_map(|reference| newest.remove(reference))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::tests::ALICE;
    use crate::strategy::tests::StubProvider;
    use crate::strategy::CacheStrategy;
    use crate::tags::tag;
    use crate::validator::tests::exercise_record;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn authority(n: u32) -> String {
        format!("{:064x}", n)
    }

    fn exercise(author: &str, d: &str, created_at: i64) -> RawRecord {
        let mut raw = exercise_record(&format!("ex-{author}-{d}-{created_at}"), d);
        raw.authority = author.into();
        raw.created_at = created_at;
        raw
    }

    fn exercise_ref(author: &str, d: &str) -> String {
        format!("33401:{author}:{d}")
    }

    fn template(author: &str, d: &str, exercises: &[&str]) -> RawRecord {
        let mut tags = vec![tag(&["d", d]), tag(&["title", "Leg Day"]), tag(&["type", "strength"])];
        for e in exercises {
            tags.push(tag(&["exercise", &exercise_ref(author, e), "100", "5"]));
        }
        RawRecord {
            id: format!("tpl-{d}"),
            kind: RecordKind::TEMPLATE_CODE,
            authority: author.into(),
            created_at: 1_700_000_000,
            tags,
            content: String::new(),
        }
    }

    fn collection(id: &str, created_at: i64, refs: &[String]) -> RawRecord {
        let mut tags = vec![tag(&["d", "favs"]), tag(&["title", id])];
        tags.extend(refs.iter().map(|r| tag(&["a", r])));
        RawRecord {
            id: id.into(),
            kind: RecordKind::COLLECTION_CODE,
            authority: ALICE.into(),
            created_at,
            tags,
            content: String::new(),
        }
    }

    fn resolver(stub: StubProvider, strategy: CacheStrategy) -> (Arc<StubProvider>, ReferenceResolver) {
        let stub = Arc::new(stub);
        let resolver = ReferenceResolver::new(stub.clone())
            .with_options(FetchOptions::default().with_strategy(strategy));
        (stub, resolver)
    }

    #[tokio::test]
    async fn test_fifty_references_three_authorities_three_fetches() {
        crate::logging::init_test();
        let mut records = Vec::new();
        let mut refs = Vec::new();
        for i in 0..50u32 {
            let author = authority(i % 3 + 1);
            let d = format!("move-{i}");
            records.push(exercise(&author, &d, 1));
            refs.push(exercise_ref(&author, &d));
        }
        let (stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);

        let resolved = resolver.resolve_exercises(&refs).await.unwrap();

        assert_eq!(resolved.items.len(), 50);
        assert!(resolved.diagnostics.is_empty());
        assert_eq!(stub.calls(), (3, 0));
        assert_eq!(stub.filters_seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_partial_failure_returns_valid_items_and_diagnostics() {
        let records: Vec<_> = (0..5).map(|i| exercise(ALICE, &format!("e{i}"), 1)).collect();
        let mut refs: Vec<String> = (0..5).map(|i| exercise_ref(ALICE, &format!("e{i}"))).collect();
        refs.push("33401:not-hex:e9".into());
        refs.push(exercise_ref(ALICE, "bench,100,8"));
        let (_stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);

        let resolved = resolver.resolve_exercises(&refs).await.unwrap();

        assert_eq!(resolved.items.len(), 5);
        assert_eq!(resolved.diagnostics.len(), 2);
        assert!(resolved.diagnostics[1].corrupted);
    }

    #[tokio::test]
    async fn test_duplicates_and_missing_are_not_errors() {
        let records = vec![exercise(ALICE, "squat", 1)];
        let refs = vec![
            exercise_ref(ALICE, "squat"),
            exercise_ref(ALICE, "squat"),
            exercise_ref(ALICE, "nowhere"),
        ];
        let (_stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);

        let resolved = resolver.resolve_exercises(&refs).await.unwrap();
        assert_eq!(resolved.items.len(), 1);
        assert_eq!(resolved.items[0].id, "squat");
    }

    #[tokio::test]
    async fn test_empty_valid_set_short_circuits() {
        let stub = StubProvider::default();
        stub.forbid_network.store(true, Ordering::SeqCst);
        let (stub, resolver) = resolver(stub, CacheStrategy::NetworkOnly);

        let resolved = resolver.resolve_exercises(&["garbage"]).await.unwrap();
        assert!(resolved.items.is_empty());
        assert_eq!(resolved.diagnostics.len(), 1);
        assert_eq!(stub.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_wrong_kind_is_contract_violation() {
        let (_stub, resolver) = resolver(StubProvider::default(), CacheStrategy::CacheOnly);
        let result = resolver
            .resolve_exercises(&[format!("33402:{ALICE}:legs")])
            .await;
        assert!(matches!(result, Err(Error::Contract(_))));
    }

    #[tokio::test]
    async fn test_newest_version_wins() {
        let mut old = exercise(ALICE, "squat", 100);
        old.tags[1] = tag(&["title", "Old Squat"]);
        let mut new = exercise(ALICE, "squat", 200);
        new.tags[1] = tag(&["title", "New Squat"]);
        let (_stub, resolver) =
            resolver(StubProvider::with_cache(vec![new, old]), CacheStrategy::CacheOnly);

        let resolved = resolver
            .resolve_exercises(&[exercise_ref(ALICE, "squat")])
            .await
            .unwrap();
        assert_eq!(resolved.items.len(), 1);
        assert_eq!(resolved.items[0].title, "New Squat");
    }

    #[tokio::test]
    async fn test_templates_resolve_in_two_rounds() {
        let mut records = vec![
            template(ALICE, "legs", &["squat", "lunge", "squat"]),
            template(ALICE, "push", &["bench", "dip"]),
            template(ALICE, "pull", &["row", "squat"]),
        ];
        for d in ["squat", "lunge", "bench", "dip", "row"] {
            records.push(exercise(ALICE, d, 1));
        }
        let refs: Vec<String> = ["legs", "push", "pull"]
            .iter()
            .map(|d| format!("33402:{ALICE}:{d}"))
            .collect();
        let (stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);

        let resolution = resolver.resolve_templates(&refs).await.unwrap();

        assert_eq!(resolution.templates.len(), 3);
        assert_eq!(resolution.exercises.len(), 5);
        // One template batch, one exercise batch.
        assert_eq!(stub.calls(), (2, 0));

        let legs = &resolution.templates[0];
        assert_eq!(legs.exercises.len(), 2);
        assert_eq!(legs.exercises[0].sets, 2);
        assert_eq!(legs.exercises[1].sets, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout_propagates() {
        let stub = StubProvider::with_network(vec![exercise(ALICE, "squat", 1)]);
        *stub.network_delay.lock().unwrap() = Some(Duration::from_secs(60));
        let stub = Arc::new(stub);
        let resolver = ReferenceResolver::new(stub.clone()).with_options(
            FetchOptions::default()
                .with_strategy(CacheStrategy::NetworkOnly)
                .with_timeout(Duration::from_millis(100)),
        );

        let result = resolver
            .resolve_exercises(&[exercise_ref(ALICE, "squat")])
            .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_empty() {
        let stub = StubProvider::default();
        stub.fail_network.store(true, Ordering::SeqCst);
        let (_stub, resolver) = resolver(stub, CacheStrategy::NetworkOnly);

        let result = resolver
            .resolve_exercises(&[exercise_ref(ALICE, "squat")])
            .await;
        assert!(matches!(result, Err(Error::Provider(_))));
    }

    #[tokio::test]
    async fn test_single_template_with_exercises() {
        let records = vec![
            template(ALICE, "legs", &["squat", "squat", "lunge"]),
            exercise(ALICE, "squat", 1),
        ];
        let (_stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);

        let single = resolver
            .resolve_single_template(&format!("33402:{ALICE}:legs"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(single.template.total_sets(), 3);
        // lunge is missing from the source and silently omitted
        assert_eq!(single.exercises.len(), 1);
        let squat_entry = &single.template.exercises[0];
        assert!(single.exercise_for(&squat_entry.reference).is_some());

        let missing = resolver
            .resolve_single_template(&format!("33402:{ALICE}:nope"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_template_entry_is_reported() {
        let records = vec![
            template(ALICE, "legs", &["squat", "bench,100,8"]),
            exercise(ALICE, "squat", 1),
        ];
        let (_stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);
        let legs = format!("33402:{ALICE}:legs");

        let resolution = resolver.resolve_templates(&[legs.as_str()]).await.unwrap();
        assert_eq!(resolution.templates.len(), 1);
        assert_eq!(resolution.templates[0].total_sets(), 1);
        assert_eq!(resolution.exercises.len(), 1);
        assert_eq!(resolution.diagnostics.len(), 1);
        assert!(resolution.diagnostics[0].corrupted);
        assert_eq!(resolution.diagnostics[0].input, exercise_ref(ALICE, "bench,100,8"));

        let single = resolver.resolve_single_template(&legs).await.unwrap().unwrap();
        assert_eq!(single.diagnostics, resolution.diagnostics);
    }

    #[tokio::test]
    async fn test_collection_newest_version_and_content() {
        let old = collection("c-old", 100, &[exercise_ref(ALICE, "row")]);
        let new = collection(
            "c-new",
            200,
            &[
                exercise_ref(ALICE, "squat"),
                format!("33402:{ALICE}:push"),
                exercise_ref(ALICE, "bench,8"),
            ],
        );
        let records = vec![
            old,
            new,
            template(ALICE, "push", &["bench"]),
            exercise(ALICE, "squat", 1),
            exercise(ALICE, "bench", 1),
            exercise(ALICE, "row", 1),
        ];
        let (stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);

        let (collection, content) = resolver
            .resolve_collection_by_ref(&format!("30003:{ALICE}:favs"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(collection.record_id, "c-new");
        assert_eq!(content.templates.len(), 1);
        let mut ids: Vec<_> = content.exercises.iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["bench", "squat"]);
        assert_eq!(content.diagnostics.len(), 1);
        assert!(content.diagnostics[0].corrupted);
        // collection, templates, exercises
        assert_eq!(stub.calls(), (3, 0));
    }

    #[tokio::test]
    async fn test_workout_template_edge() {
        let records = vec![template(ALICE, "legs", &["squat"]), exercise(ALICE, "squat", 1)];
        let (_stub, resolver) = resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);

        let workout = WorkoutRecord {
            id: "session-1".into(),
            record_id: "w1".into(),
            title: "Legs".into(),
            workout_type: crate::types::WorkoutType::Strength,
            started_at: crate::types::timestamp_to_utc(0),
            ended_at: crate::types::timestamp_to_utc(3600),
            completed: true,
            sets: Vec::new(),
            template: Reference::parse(&format!("33402:{ALICE}:legs")).ok(),
            notes: String::new(),
            authority: ALICE.into(),
        };
        let single = resolver.resolve_workout_template(&workout).await.unwrap().unwrap();
        assert_eq!(single.template.id, "legs");
        assert_eq!(single.exercises.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_cache_is_per_resolver_and_reused() {
        let records = vec![exercise(ALICE, "squat", 1)];
        let (_stub, resolver) = resolver(StubProvider::with_cache(records.clone()), CacheStrategy::CacheOnly);
        let refs = [exercise_ref(ALICE, "squat")];

        resolver.resolve_exercises(&refs).await.unwrap();
        resolver.resolve_exercises(&refs).await.unwrap();
        let stats = resolver.parse_cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);

        let (_other_stub, other) = super::tests::resolver(StubProvider::with_cache(records), CacheStrategy::CacheOnly);
        assert_eq!(other.parse_cache_stats().misses, 0);
    }
}
