#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use dynamic_synonym::analysis::token_filter::{Filter, LowercaseFilter};
    use dynamic_synonym::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
    use dynamic_synonym::config::{AnalysisStage, ServiceConfig, Settings};
    use dynamic_synonym::error::{Result, SynonymError};
    use dynamic_synonym::factory::{DynamicSynonymFilter, DynamicSynonymFilterFactory, FilterKind};
    use dynamic_synonym::service::SynonymService;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        service: Arc<SynonymService>,
    }

    impl Fixture {
        fn new(rules: &str) -> Self {
            let dir = TempDir::new().unwrap();
            write_rules(dir.path(), rules);
            let service = SynonymService::new(ServiceConfig {
                config_dir: Some(dir.path().to_path_buf()),
                ..ServiceConfig::default()
            })
            .unwrap();
            Fixture { dir, service }
        }

        fn filter(&self, kind: FilterKind, lenient: bool) -> Result<DynamicSynonymFilter> {
            let settings = Settings::new()
                .put("synonyms_path", "synonym.txt")
                .put("interval", 1)
                .put("lenient", lenient);
            let factory = DynamicSynonymFilterFactory::new(
                Arc::clone(&self.service),
                "products",
                "synonyms",
                kind,
                &settings,
            )?;
            factory.chain_aware(
                AnalysisStage::Search,
                Arc::new(WhitespaceTokenizer::new()),
                &[Arc::new(LowercaseFilter::new()) as Arc<dyn Filter>],
            )
        }
    }

    fn write_rules(dir: &Path, rules: &str) {
        fs::write(dir.join("synonym.txt"), rules).unwrap();
    }

    fn analyze(filter: &DynamicSynonymFilter, text: &str) -> Vec<String> {
        let tokens = WhitespaceTokenizer::new().tokenize(text).unwrap();
        let tokens = LowercaseFilter::new().filter(tokens).unwrap();
        filter.filter(tokens).unwrap().map(|t| t.text).collect()
    }

    fn wait_for_version(filter: &DynamicSynonymFilter, version: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if filter.task().live().version() >= version {
                return true;
            }
            thread::sleep(Duration::from_millis(50));
        }
        false
    }

    #[test]
    fn test_local_file_hot_reload() {
        let fixture = Fixture::new("quick, fast\n");
        let filter = fixture.filter(FilterKind::SynonymGraph, false).unwrap();
        assert_eq!(analyze(&filter, "quick"), vec!["quick", "fast"]);
        assert_eq!(analyze(&filter, "rapid"), vec!["rapid"]);

        write_rules(fixture.dir.path(), "quick, fast, rapid\n");
        assert!(wait_for_version(&filter, 1), "reload was not observed");

        // Every stream created after the publish sees the new table.
        assert_eq!(analyze(&filter, "quick"), vec!["quick", "fast", "rapid"]);
        assert_eq!(analyze(&filter, "rapid"), vec!["rapid", "quick", "fast"]);
        assert_eq!(filter.task().stats().reloads, 1);

        fixture.service.shutdown();
    }

    #[test]
    fn test_stream_started_before_reload_sees_reload_on_first_pull() {
        let fixture = Fixture::new("quick, fast\n");
        let filter = fixture.filter(FilterKind::Synonym, false).unwrap();

        let tokens = WhitespaceTokenizer::new().tokenize("quick").unwrap();
        let stream = filter.filter(tokens).unwrap();
        assert_eq!(filter.task().consumers().len(), 1);

        write_rules(fixture.dir.path(), "quick, speedy\n");
        assert!(wait_for_version(&filter, 1));

        let texts: Vec<String> = stream.map(|t| t.text).collect();
        assert_eq!(texts, vec!["quick", "speedy"]);
        assert!(filter.task().consumers().is_empty());
    }

    #[test]
    fn test_strict_initial_build_fails() {
        let fixture = Fixture::new("quick, fast\na => b => c\n");
        let result = fixture.filter(FilterKind::SynonymGraph, false);

        let err = result.unwrap_err();
        assert!(matches!(err, SynonymError::Build(_)));
        assert!(err.to_string().contains("line 2"));
        assert!(fixture.service.registry().is_empty());
    }

    #[test]
    fn test_lenient_initial_build_skips_bad_line() {
        let fixture = Fixture::new("quick, fast\na => b => c\nbig, large\n");
        let filter = fixture.filter(FilterKind::SynonymGraph, true).unwrap();

        assert_eq!(analyze(&filter, "big"), vec!["big", "large"]);
        assert_eq!(analyze(&filter, "a"), vec!["a"]);
    }

    #[test]
    fn test_malformed_reload_keeps_serving_previous_table() {
        let fixture = Fixture::new("quick, fast\n");
        let filter = fixture.filter(FilterKind::SynonymGraph, false).unwrap();

        write_rules(fixture.dir.path(), "quick, fast, rapid\nbroken => \n");
        let deadline = Instant::now() + Duration::from_secs(10);
        while filter.task().stats().failures == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }

        assert!(filter.task().stats().failures >= 1);
        assert_eq!(filter.task().live().version(), 0);
        assert_eq!(analyze(&filter, "quick"), vec!["quick", "fast"]);

        // A fixed file is picked up on a later round.
        write_rules(fixture.dir.path(), "quick, fast, rapid\n");
        assert!(wait_for_version(&filter, 1));
        assert_eq!(analyze(&filter, "quick"), vec!["quick", "fast", "rapid"]);
    }

    #[test]
    fn test_missing_file_is_fatal_at_construction() {
        let fixture = Fixture::new("quick, fast\n");
        fs::remove_file(fixture.dir.path().join("synonym.txt")).unwrap();

        let result = fixture.filter(FilterKind::Synonym, false);
        assert!(matches!(result, Err(SynonymError::Fetch(_))));
    }
}
