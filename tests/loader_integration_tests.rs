//! Integration tests for the table loader
//!
//! Tests the complete flow:
//! Dev root / asset store → Normalize → Parse → Table → Registry → Reload

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tower_tables::catalog::{
    self, CurrencyData, CurrencyType, EffectData, MonsterLevelData, SkillData, SkillLevelData,
    SkillType, StageData,
};
use tower_tables::config::SourceConfig;
use tower_tables::loader::{LoadState, TableOutcome};
use tower_tables::source::{
    build_source, AssetStore, MemoryAssetStore, SourceError, SourceMode, SourceProvider, SourceRef,
};
use tower_tables::{LoadConfig, LoadError, TableLoader, TableRegistry, TableSelection};

const SKILL_SHEET: &str = "\
스킬 ID,스킬 이름,타입,쿨타임
Skill_ID,Skill_Name,Skill_Type,Cooldown
INT,STRING,ENUM,FLOAT
39001,Fireball,1,3.5
39002,Haste,2,N/A
39003,Curse,Debuff,12

";

const EFFECT_SHEET: &str = "\
효과 ID,이름,분류,지속
Effect_ID,Effect_Name,Effect_Category,Duration
INT,STRING,ENUM,FLOAT
501,Burn,1,3
502,Slow,3,
";

const SKILL_LEVEL_SHEET: &str = "skill_id,level,damage_mult\r\n39002,1,1.0\r\n39002,2,1.2\r\n39002,3,1.5\r\n";
const CURRENCY_SHEET: &str = "Currency_ID,Currency_Type\n1,1\n2,2\n";
const STAGE_SHEET: &str = "Stage_ID,Wave_1_ID,Wave_2_ID,Time_Limit\n101,11,N/A,120\n102,21,22,150\n";

/// Write the catalog sheets that exist for most tests into a fresh dev root
fn dev_root() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "SkillTable.csv", SKILL_SHEET);
    write(dir.path(), "EffectTable.csv", EFFECT_SHEET);
    write(dir.path(), "SkillLevelTable.csv", SKILL_LEVEL_SHEET);
    write(dir.path(), "CurrencyTable.csv", CURRENCY_SHEET);
    write(dir.path(), "StageTable.csv", STAGE_SHEET);
    dir
}

fn write(root: &Path, file: &str, text: &str) {
    std::fs::write(root.join(file), text).unwrap();
}

fn filesystem_loader(root: &Path) -> TableLoader {
    let config = SourceConfig {
        mode: SourceMode::FileSystem,
        dev_root: root.to_path_buf(),
    };
    TableLoader::new(
        Arc::new(TableRegistry::new()),
        build_source(&config, None).unwrap(),
        catalog::registrations().unwrap(),
        LoadConfig::default(),
    )
}

fn outcome<'a>(outcomes: &'a [TableOutcome], source_id: &str) -> &'a TableOutcome {
    outcomes.iter().find(|o| o.source_id == source_id).unwrap()
}

// ============================================================================
// Initial load
// ============================================================================

#[tokio::test]
async fn test_catalog_load_from_dev_root() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    let report = loader.load_all().await;

    assert!(loader.is_ready());
    assert_eq!(report.outcomes.len(), 11);
    assert_eq!(report.loaded(), 5);

    let registry = loader.registry();
    assert_eq!(registry.table::<SkillData>().unwrap().len(), 3);
    assert_eq!(registry.table::<EffectData>().unwrap().len(), 2);
    assert_eq!(registry.table::<SkillLevelData>().unwrap().len(), 3);
    assert_eq!(registry.table::<CurrencyData>().unwrap().len(), 2);
    assert_eq!(registry.table::<StageData>().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_sources_leave_slots_absent() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    let report = loader.load_all().await;

    // No MonsterLevelTable.csv in the dev root
    assert!(matches!(
        outcome(&report.outcomes, "MonsterLevelTable").error(),
        Some(LoadError::Source(SourceError::NotFound { .. }))
    ));
    assert!(loader.registry().table::<MonsterLevelData>().is_none());
    assert!(loader.registry().table::<SkillData>().is_some());
    assert_eq!(loader.state(), LoadState::Ready);
}

#[tokio::test]
async fn test_triple_header_and_sentinel() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    loader.load_all().await;
    let registry = loader.registry();

    let skills = registry.table::<SkillData>().unwrap();
    let ids: Vec<i32> = skills.iter().map(|s| s.skill_id).collect();
    assert_eq!(ids, vec![39001, 39002, 39003]);
    assert_eq!(skills.get(39002).unwrap().cooldown, 0.0);
    assert_eq!(skills.get(39003).unwrap().skill_type, SkillType::Debuff);

    assert_eq!(registry.get_by_key::<EffectData>(502).unwrap().duration, None);
    assert_eq!(registry.get_by_key::<StageData>(101).unwrap().wave_ids[1], 0);
}

#[tokio::test]
async fn test_composite_key_lookup() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    loader.load_all().await;

    let level = loader
        .registry()
        .get_by_key::<SkillLevelData>(SkillLevelData::key_for(39002, 3).unwrap())
        .unwrap();
    assert_eq!(level.composite_key(), Some(3900203));
    assert_eq!(level.damage_mult, 1.5);
}

#[tokio::test]
async fn test_packaged_source_and_overlay() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "CurrencyTable.csv", "Currency_ID,Currency_Type\n9,3\n");

    let store = Arc::new(MemoryAssetStore::new());
    store.insert("CurrencyTable", CURRENCY_SHEET);
    store.insert("StageTable", STAGE_SHEET);
    let assets: Arc<dyn AssetStore> = store;

    let config = SourceConfig {
        mode: SourceMode::DevOverlay,
        dev_root: dir.path().to_path_buf(),
    };
    let loader = TableLoader::new(
        Arc::new(TableRegistry::new()),
        build_source(&config, Some(assets)).unwrap(),
        catalog::registrations().unwrap(),
        LoadConfig::default(),
    );
    loader.load_all().await;

    // Dev file wins for currency, asset store supplies stages
    let currency = loader.registry().table::<CurrencyData>().unwrap();
    assert_eq!(currency.len(), 1);
    assert_eq!(currency.get(9).unwrap().currency_type, CurrencyType::SpecialCurrency);
    assert_eq!(loader.registry().table::<StageData>().unwrap().len(), 2);
}

// ============================================================================
// Reload
// ============================================================================

#[tokio::test]
async fn test_reload_subset_only_touches_selection() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    loader.load_all().await;
    let registry = Arc::clone(loader.registry());
    let skills_before = registry.table::<SkillData>().unwrap();
    let currency_before = registry.table::<CurrencyData>().unwrap();

    write(dir.path(), "SkillTable.csv", &SKILL_SHEET.replace("Fireball", "Inferno"));
    write(dir.path(), "CurrencyTable.csv", "Currency_ID,Currency_Type\n1,1\n2,2\n3,3\n");

    let report = loader
        .reload_subset(&TableSelection::new().with::<SkillData>())
        .await;
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.is_complete_success());

    let skills_after = registry.table::<SkillData>().unwrap();
    assert!(!Arc::ptr_eq(&skills_before, &skills_after));
    assert_eq!(skills_after.get(39001).unwrap().skill_name, "Inferno");
    assert_eq!(skills_before.get(39001).unwrap().skill_name, "Fireball");

    let currency_after = registry.table::<CurrencyData>().unwrap();
    assert!(Arc::ptr_eq(&currency_before, &currency_after));
    assert_eq!(currency_after.len(), 2);
}

#[tokio::test]
async fn test_reload_all_is_deterministic() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    loader.load_all().await;
    let first = loader.registry().table::<SkillData>().unwrap();

    loader.reload_all().await;
    let second = loader.registry().table::<SkillData>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    let first: Vec<&SkillData> = first.iter().collect();
    let second: Vec<&SkillData> = second.iter().collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_reload_after_delete_keeps_previous_table() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    loader.load_all().await;
    let before = loader.registry().table::<StageData>().unwrap();

    std::fs::remove_file(dir.path().join("StageTable.csv")).unwrap();
    let report = loader
        .reload_subset(&TableSelection::new().source("StageTable"))
        .await;
    assert_eq!(report.failed(), 1);
    assert!(Arc::ptr_eq(&before, &loader.registry().table::<StageData>().unwrap()));
}

#[tokio::test]
async fn test_reload_picks_up_new_table() {
    let dir = dev_root();
    let loader = filesystem_loader(dir.path());
    loader.load_all().await;
    assert!(loader.registry().table::<MonsterLevelData>().is_none());

    write(
        dir.path(),
        "MonsterLevelTable.csv",
        "Mon_Level_ID,Monster_Grade,HP\n1,1,100\n2,MidBoss,2500\n",
    );
    loader
        .reload_subset(&TableSelection::new().source("MonsterLevelTable.csv"))
        .await;
    assert_eq!(loader.registry().table::<MonsterLevelData>().unwrap().len(), 2);
}

// ============================================================================
// Timeout and cancellation
// ============================================================================

/// Answers `fast` immediately and stalls on everything else
struct SlowSource {
    fast: &'static str,
    text: &'static str,
}

#[async_trait]
impl SourceProvider for SlowSource {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn resolve(&self, source: &SourceRef<'_>) -> Result<String, SourceError> {
        if source.id == self.fast {
            Ok(self.text.to_string())
        } else {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(SourceError::Fetch {
                id: source.id.to_string(),
                reason: "gave up".to_string(),
            })
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_does_not_block_ready() {
    let loader = TableLoader::new(
        Arc::new(TableRegistry::new()),
        Arc::new(SlowSource {
            fast: "CurrencyTable",
            text: CURRENCY_SHEET,
        }),
        catalog::registrations().unwrap(),
        LoadConfig {
            source_timeout: Duration::from_secs(2),
        },
    );

    let report = loader.load_all().await;
    assert!(loader.is_ready());
    assert_eq!(report.loaded(), 1);
    assert_eq!(
        report
            .failures()
            .filter(|o| matches!(o.error(), Some(LoadError::TimedOut(_))))
            .count(),
        10
    );
    assert_eq!(loader.registry().table::<CurrencyData>().unwrap().len(), 2);
    assert_eq!(loader.stats().timeouts, 10);
}

#[tokio::test]
async fn test_cancelled_reload_keeps_loaded_tables() {
    let dir = dev_root();
    let initial = filesystem_loader(dir.path());
    initial.load_all().await;
    let registry = Arc::clone(initial.registry());
    let skills = registry.table::<SkillData>().unwrap();
    let stages = registry.table::<StageData>().unwrap();

    let loader = Arc::new(TableLoader::new(
        Arc::clone(&registry),
        Arc::new(SlowSource {
            fast: "CurrencyTable",
            text: "Currency_ID,Currency_Type\n7,1\n",
        }),
        catalog::registrations().unwrap(),
        LoadConfig {
            source_timeout: Duration::from_secs(3600),
        },
    ));

    let batch = tokio::spawn({
        let loader = Arc::clone(&loader);
        async move { loader.reload_all().await }
    });
    loader
        .subscribe()
        .wait_for(|s| *s == LoadState::Loading)
        .await
        .unwrap();
    loader.cancel();

    let report = batch.await.unwrap();
    assert!(loader.is_ready());
    assert!(matches!(
        outcome(&report.outcomes, "SkillTable").error(),
        Some(LoadError::Cancelled)
    ));
    assert!(report
        .failures()
        .all(|o| matches!(o.error(), Some(LoadError::Cancelled))));

    // Cancelled pipelines leave the published tables in place
    assert!(Arc::ptr_eq(&skills, &registry.table::<SkillData>().unwrap()));
    assert!(Arc::ptr_eq(&stages, &registry.table::<StageData>().unwrap()));

    // Batches after a cancel run normally
    let report = loader
        .reload_subset(&TableSelection::new().with::<CurrencyData>())
        .await;
    assert!(report.is_complete_success());
    assert!(registry.get_by_key::<CurrencyData>(7).is_some());
}
