//! Game table catalog - record types, schemas and the startup batch
//!
//! One record type per designer sheet. Column names match the sheet headers
//! exactly; the parser falls back to case-insensitive matching.
//!
//! | Record             | Source              | Header | Key                      |
//! |--------------------|---------------------|--------|--------------------------|
//! | `SkillData`        | `SkillTable`        | triple | `Skill_ID`               |
//! | `EffectData`       | `EffectTable`       | triple | `Effect_ID`              |
//! | `SkillLevelData`   | `SkillLevelTable`   | single | `skill_id * 100 + level` |
//! | `CurrencyData`     | `CurrencyTable`     | single | `Currency_ID`            |
//! | `PlayerLevelData`  | `PlayerLevelTable`  | single | `Level_ID`               |
//! | `CardLevelData`    | `CardLevelTable`    | single | `Card_Level_ID`          |
//! | `StageData`        | `StageTable`        | single | `Stage_ID`               |
//! | `MonsterLevelData` | `MonsterLevelTable` | single | `Mon_Level_ID`           |
//! | `CharacterData`    | `CharacterTable`    | single | `Character_ID`           |
//! | `IngredientData`   | `IngredientTable`   | single | `Ingredient_ID`          |
//! | `BookmarkData`     | `BookmarkTable`     | single | `Bookmark_ID`            |

use crate::loader::{Registration, RegistrationError, RegistrationSet};
use crate::parser::Schema;
use crate::table::{composite_key, TableKey};
use crate::table_enum;

// ============================================================================
// Enumerations
// ============================================================================

table_enum! {
    pub enum SkillType {
        Attack = 1,
        Buff = 2,
        Debuff = 3,
    }
}

table_enum! {
    pub enum AttackRange {
        Single = 1,
        Area = 2,
        Wide = 3,
    }
}

table_enum! {
    pub enum EffectCategory {
        Damage = 1,
        Buff = 2,
        Debuff = 3,
        Special = 4,
    }
}

table_enum! {
    pub enum TargetType {
        Ally = 1,
        Enemy = 2,
        All = 3,
    }
}

table_enum! {
    pub enum EffectApplyMode {
        Instant = 1,
        Duration = 2,
        Dot = 3,
    }
}

table_enum! {
    pub enum CurrencyType {
        FreeCurrency = 1,
        PaidCurrency = 2,
        SpecialCurrency = 3,
    }
}

table_enum! {
    pub enum MonsterGrade {
        Normal = 1,
        MidBoss = 2,
        FinalBoss = 3,
    }
}

table_enum! {
    pub enum LevelType {
        Level1 = 1,
        Level2 = 2,
        Level3 = 3,
        Level4 = 4,
        Level5 = 5,
        Level6 = 6,
        Level7 = 7,
        Level8 = 8,
        Level9 = 9,
        Level10 = 10,
    }
}

table_enum! {
    pub enum Genre {
        Horror = 1,
        Romance = 2,
        Adventure = 3,
        Comedy = 4,
        Mystery = 5,
    }
}

table_enum! {
    pub enum UseType {
        BookmarkCraft = 1,
        UserLevelUp = 2,
        ProductPurchase = 3,
    }
}

table_enum! {
    pub enum OptionType {
        AttackPower = 1,
        AttackSkill = 2,
    }
}

// ============================================================================
// Skills and effects (triple-header sheets)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillData {
    pub skill_id: i32,
    pub skill_name: String,
    pub skill_type: SkillType,
    pub attack_range: AttackRange,
    pub cooldown: f32,
    pub cast_time: f32,
    pub effect_id: i32,
    pub equipable: bool,
    pub description: String,
    pub table_num: i32,
    pub order2: i32,
}

impl SkillData {
    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Skill_ID", |r: &mut Self, v| r.skill_id = v)
            .required("Skill_Name", |r: &mut Self, v| r.skill_name = v)
            .required("Skill_Type", |r: &mut Self, v| r.skill_type = v)
            .optional("Attack_Range", |r: &mut Self, v| r.attack_range = v)
            .optional("Cooldown", |r: &mut Self, v| r.cooldown = v)
            .optional("Cast_Time", |r: &mut Self, v| r.cast_time = v)
            .optional("Effect_ID", |r: &mut Self, v| r.effect_id = v)
            .optional("Equipable", |r: &mut Self, v| r.equipable = v)
            .optional("Description", |r: &mut Self, v| r.description = v)
            .optional("Table_Num", |r: &mut Self, v| r.table_num = v)
            .optional("Order2", |r: &mut Self, v| r.order2 = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("SkillTable", Self::schema(), |r: &Self| r.skill_id).triple_header()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectData {
    pub effect_id: i32,
    pub effect_name: String,
    pub effect_level: i32,
    pub effect_category: EffectCategory,
    pub target_type: TargetType,
    pub effect_apply_mode: EffectApplyMode,
    pub effect_value: f32,
    /// Empty cell means the effect has no duration
    pub duration: Option<f32>,
    pub stackable: bool,
    pub is_upgrade: bool,
    pub description: String,
    pub table_num: i32,
    pub order2: i32,
}

impl EffectData {
    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Effect_ID", |r: &mut Self, v| r.effect_id = v)
            .required("Effect_Name", |r: &mut Self, v| r.effect_name = v)
            .optional("Effect_Level", |r: &mut Self, v| r.effect_level = v)
            .required("Effect_Category", |r: &mut Self, v| r.effect_category = v)
            .optional("Target_Type", |r: &mut Self, v| r.target_type = v)
            .optional("Effect_Apply_Mode", |r: &mut Self, v| r.effect_apply_mode = v)
            .optional("Effect_Value", |r: &mut Self, v| r.effect_value = v)
            .optional("Duration", |r: &mut Self, v| r.duration = v)
            // Sheet header is spelled "Stackble"
            .optional("Stackble", |r: &mut Self, v| r.stackable = v)
            .optional("Is_Upgrade", |r: &mut Self, v| r.is_upgrade = v)
            .optional("Description", |r: &mut Self, v| r.description = v)
            .optional("Table_Num", |r: &mut Self, v| r.table_num = v)
            .optional("Order2", |r: &mut Self, v| r.order2 = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("EffectTable", Self::schema(), |r: &Self| r.effect_id).triple_header()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillLevelData {
    pub skill_id: i32,
    pub level: i32,
    pub damage_mult: f32,
    pub cooldown_mult: f32,
    pub range_mult: f32,
    pub aoe_mult: f32,
    pub projectile_add: i32,
    pub pierce_add: i32,
    pub duration_mult: f32,
    pub unlock_condition: String,
}

impl SkillLevelData {
    /// Table key for a skill at a level: `skill_id * 100 + level`, with
    /// `level` in `0..100`
    pub fn key_for(skill_id: i32, level: i32) -> Option<TableKey> {
        composite_key(skill_id, level)
    }

    pub fn composite_key(&self) -> Option<TableKey> {
        Self::key_for(self.skill_id, self.level)
    }

    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("skill_id", |r: &mut Self, v| r.skill_id = v)
            .required("level", |r: &mut Self, v| r.level = v)
            .optional("damage_mult", |r: &mut Self, v| r.damage_mult = v)
            .optional("cooldown_mult", |r: &mut Self, v| r.cooldown_mult = v)
            .optional("range_mult", |r: &mut Self, v| r.range_mult = v)
            .optional("aoe_mult", |r: &mut Self, v| r.aoe_mult = v)
            .optional("projectile_add", |r: &mut Self, v| r.projectile_add = v)
            .optional("pierce_add", |r: &mut Self, v| r.pierce_add = v)
            .optional("duration_mult", |r: &mut Self, v| r.duration_mult = v)
            .optional("unlock_condition", |r: &mut Self, v| r.unlock_condition = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::try_keyed("SkillLevelTable", Self::schema(), Self::composite_key)
    }
}

// ============================================================================
// Economy and progression
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrencyData {
    pub currency_id: i32,
    pub currency_name_id: i32,
    pub currency_type: CurrencyType,
    pub currency_max_count: i32,
    pub currency_purchase: bool,
    pub currency_consume: bool,
}

impl CurrencyData {
    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Currency_ID", |r: &mut Self, v| r.currency_id = v)
            .optional("Currency_Name_ID", |r: &mut Self, v| r.currency_name_id = v)
            .required("Currency_Type", |r: &mut Self, v| r.currency_type = v)
            .optional("Currency_Max_Count", |r: &mut Self, v| r.currency_max_count = v)
            .optional("Currency_Purchase", |r: &mut Self, v| r.currency_purchase = v)
            .optional("Currency_Consume", |r: &mut Self, v| r.currency_consume = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("CurrencyTable", Self::schema(), |r: &Self| r.currency_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerLevelData {
    pub level_id: i32,
    pub req_exp: f32,
    pub tot_exp: f32,
    pub card_list_id: i32,
    pub character_card_appear: i32,
}

impl PlayerLevelData {
    /// Player level encoded in the last two digits of `Level_ID`
    pub fn level(&self) -> i32 {
        self.level_id % 100
    }

    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Level_ID", |r: &mut Self, v| r.level_id = v)
            .required("Req_EXP", |r: &mut Self, v| r.req_exp = v)
            .optional("Tot_EXP", |r: &mut Self, v| r.tot_exp = v)
            .optional("Card_List_ID", |r: &mut Self, v| r.card_list_id = v)
            .optional("Character_Card_Appear", |r: &mut Self, v| r.character_card_appear = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("PlayerLevelTable", Self::schema(), |r: &Self| r.level_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardLevelData {
    pub card_level_id: i32,
    pub tier: i32,
    pub value_change: f32,
    pub is_final_level: bool,
}

impl CardLevelData {
    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Card_Level_ID", |r: &mut Self, v| r.card_level_id = v)
            .optional("Tier", |r: &mut Self, v| r.tier = v)
            .optional("value_change", |r: &mut Self, v| r.value_change = v)
            .optional("Is_Final_Level", |r: &mut Self, v| r.is_final_level = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("CardLevelTable", Self::schema(), |r: &Self| r.card_level_id)
    }
}

// ============================================================================
// Stages and monsters
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageData {
    pub stage_id: i32,
    pub stage_name_id: i32,
    pub chapter_number: i32,
    pub wave_ids: [i32; 4],
    pub time_limit: f32,
    pub barrier_hp: f32,
    pub reward_group_id: i32,
    pub ap_cost_id: i32,
    pub ap_cost: i32,
}

impl StageData {
    /// Non-zero wave ids in play order
    pub fn waves(&self) -> impl Iterator<Item = i32> + '_ {
        self.wave_ids.iter().copied().filter(|&id| id != 0)
    }

    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Stage_ID", |r: &mut Self, v| r.stage_id = v)
            .optional("Stage_Name_ID", |r: &mut Self, v| r.stage_name_id = v)
            .optional("Chapter_Number", |r: &mut Self, v| r.chapter_number = v)
            .optional("Wave_1_ID", |r: &mut Self, v| r.wave_ids[0] = v)
            .optional("Wave_2_ID", |r: &mut Self, v| r.wave_ids[1] = v)
            .optional("Wave_3_ID", |r: &mut Self, v| r.wave_ids[2] = v)
            .optional("Wave_4_ID", |r: &mut Self, v| r.wave_ids[3] = v)
            .optional("Time_Limit", |r: &mut Self, v| r.time_limit = v)
            .optional("Barrier_HP", |r: &mut Self, v| r.barrier_hp = v)
            .optional("Reward_Group_ID", |r: &mut Self, v| r.reward_group_id = v)
            .optional("AP_Cost_ID", |r: &mut Self, v| r.ap_cost_id = v)
            .optional("AP_Cost", |r: &mut Self, v| r.ap_cost = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("StageTable", Self::schema(), |r: &Self| r.stage_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonsterLevelData {
    pub mon_level_id: i32,
    pub level_type: LevelType,
    pub monster_grade: MonsterGrade,
    pub monster_weight: f32,
    pub endurance: f32,
    pub hp: f32,
    pub power: f32,
    pub atk: f32,
    pub move_speed: f32,
    pub attack_speed: f32,
    pub exp_value: i32,
}

impl MonsterLevelData {
    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Mon_Level_ID", |r: &mut Self, v| r.mon_level_id = v)
            .optional("Level_Type", |r: &mut Self, v| r.level_type = v)
            .optional("Monster_Grade", |r: &mut Self, v| r.monster_grade = v)
            .optional("Monster_Weight", |r: &mut Self, v| r.monster_weight = v)
            .optional("Endurance", |r: &mut Self, v| r.endurance = v)
            .required("HP", |r: &mut Self, v| r.hp = v)
            .optional("Power", |r: &mut Self, v| r.power = v)
            .optional("ATK", |r: &mut Self, v| r.atk = v)
            .optional("Move_Speed", |r: &mut Self, v| r.move_speed = v)
            .optional("Attack_Speed", |r: &mut Self, v| r.attack_speed = v)
            .optional("Exp_Value", |r: &mut Self, v| r.exp_value = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("MonsterLevelTable", Self::schema(), |r: &Self| r.mon_level_id)
    }
}

// ============================================================================
// Characters and items
// ============================================================================

/// Character levels are separate rows referenced by id
pub const CHARACTER_LEVELS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterData {
    pub character_id: i32,
    pub character_name_id: i32,
    pub genre: Genre,
    pub level_ids: [i32; CHARACTER_LEVELS],
    pub base_skill_id: i32,
    pub description_id: i32,
}

impl CharacterData {
    /// Level row id for a 1-based character level
    pub fn level_id(&self, level: usize) -> Option<i32> {
        let index = level.checked_sub(1)?;
        self.level_ids.get(index).copied().filter(|&id| id != 0)
    }

    pub fn schema() -> Schema<Self> {
        let schema = Schema::new()
            .required("Character_ID", |r: &mut Self, v| r.character_id = v)
            .optional("Character_Name_ID", |r: &mut Self, v| r.character_name_id = v)
            .optional("Genre", |r: &mut Self, v| r.genre = v)
            .optional("Base_Skill_ID", |r: &mut Self, v| r.base_skill_id = v)
            .optional("Description_ID", |r: &mut Self, v| r.description_id = v);
        (0..CHARACTER_LEVELS).fold(schema, |schema, i| {
            schema.optional(&format!("Cha_Level_{}_ID", i + 1), move |r: &mut Self, v: i32| {
                r.level_ids[i] = v
            })
        })
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("CharacterTable", Self::schema(), |r: &Self| r.character_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientData {
    pub ingredient_id: i32,
    pub ingredient_name_id: i32,
    pub grade_id: i32,
    pub use_type: UseType,
    pub inventory: bool,
    pub max_stack: i32,
    pub max_count: i32,
}

impl IngredientData {
    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Ingredient_ID", |r: &mut Self, v| r.ingredient_id = v)
            .optional("Ingredient_Name_ID", |r: &mut Self, v| r.ingredient_name_id = v)
            .optional("Grade_ID", |r: &mut Self, v| r.grade_id = v)
            .optional("Use_Type", |r: &mut Self, v| r.use_type = v)
            .optional("Inventory", |r: &mut Self, v| r.inventory = v)
            .optional("Max_Stack", |r: &mut Self, v| r.max_stack = v)
            .optional("Max_Count", |r: &mut Self, v| r.max_count = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("IngredientTable", Self::schema(), |r: &Self| r.ingredient_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkData {
    pub bookmark_id: i32,
    pub grade: i32,
    pub option_type: OptionType,
    pub option_value: f32,
}

impl BookmarkData {
    pub fn schema() -> Schema<Self> {
        Schema::new()
            .required("Bookmark_ID", |r: &mut Self, v| r.bookmark_id = v)
            .optional("Grade", |r: &mut Self, v| r.grade = v)
            .required("Option_Type", |r: &mut Self, v| r.option_type = v)
            .optional("Option_Value", |r: &mut Self, v| r.option_value = v)
    }

    pub fn registration() -> Registration<Self> {
        Registration::new("BookmarkTable", Self::schema(), |r: &Self| r.bookmark_id)
    }
}

/// Startup batch: every catalog table
pub fn registrations() -> Result<RegistrationSet, RegistrationError> {
    RegistrationSet::new()
        .with(SkillData::registration())?
        .with(EffectData::registration())?
        .with(SkillLevelData::registration())?
        .with(CurrencyData::registration())?
        .with(PlayerLevelData::registration())?
        .with(CardLevelData::registration())?
        .with(StageData::registration())?
        .with(MonsterLevelData::registration())?
        .with(CharacterData::registration())?
        .with(IngredientData::registration())?
        .with(BookmarkData::registration())
}
