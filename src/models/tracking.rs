use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct ExerciseEntry {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 0, max = 100))]
    pub sets: Option<i32>,
    #[validate(range(min = 0, max = 1000))]
    pub reps: Option<i32>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub weight_kg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Workout {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub duration_minutes: i32,
    pub calories_burned: Option<i32>,
    pub exercises: Json<Vec<ExerciseEntry>>,
    pub notes: Option<String>,
    pub performed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkout {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 0, max = 1440))]
    pub duration_minutes: i32,
    #[validate(range(min = 0, max = 20000))]
    pub calories_burned: Option<i32>,
    #[serde(default)]
    #[validate(nested)]
    pub exercises: Vec<ExerciseEntry>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub performed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "meal_type", rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct FoodEntry {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 50))]
    pub quantity: Option<String>,
    #[validate(range(min = 0.0, max = 10000.0))]
    #[serde(default)]
    pub calories: f64,
    #[validate(range(min = 0.0, max = 1000.0))]
    #[serde(default)]
    pub protein: f64,
    #[validate(range(min = 0.0, max = 1000.0))]
    #[serde(default)]
    pub carbs: f64,
    #[validate(range(min = 0.0, max = 1000.0))]
    #[serde(default)]
    pub fat: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MealTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

pub fn meal_totals(foods: &[FoodEntry]) -> MealTotals {
    let sum = foods.iter().fold(MealTotals::default(), |acc, food| MealTotals {
        calories: acc.calories + food.calories,
        protein: acc.protein + food.protein,
        carbs: acc.carbs + food.carbs,
        fat: acc.fat + food.fat,
    });
    let round = |v: f64| (v * 100.0).round() / 100.0;
    MealTotals {
        calories: round(sum.calories),
        protein: round(sum.protein),
        carbs: round(sum.carbs),
        fat: round(sum.fat),
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_type: MealType,
    pub foods: Json<Vec<FoodEntry>>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub notes: Option<String>,
    pub eaten_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMeal {
    pub meal_type: MealType,
    #[validate(length(min = 1, message = "Add at least one food item"), nested)]
    pub foods: Vec<FoodEntry>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub eaten_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProgressEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub weight_kg: f64,
    pub body_fat_percent: Option<f64>,
    pub bmi: Option<f64>,
    pub measurements: Json<BTreeMap<String, f64>>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProgress {
    #[validate(range(min = 20.0, max = 400.0, message = "Weight must be between 20 and 400 kg"))]
    pub weight_kg: f64,
    #[validate(range(min = 1.0, max = 80.0, message = "Body fat must be between 1 and 80 percent"))]
    pub body_fat_percent: Option<f64>,
    /// Named body measurements in centimetres (waist, hips, chest, ...)
    #[serde(default)]
    pub measurements: BTreeMap<String, f64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_totals() {
        let foods = vec![
            FoodEntry {
                name: "Oats".to_string(),
                quantity: Some("50g".to_string()),
                calories: 190.0,
                protein: 6.5,
                carbs: 33.0,
                fat: 3.5,
            },
            FoodEntry {
                name: "Banana".to_string(),
                quantity: None,
                calories: 105.0,
                protein: 1.3,
                carbs: 27.0,
                fat: 0.4,
            },
        ];

        let totals = meal_totals(&foods);
        assert_eq!(totals.calories, 295.0);
        assert_eq!(totals.protein, 7.8);
        assert_eq!(totals.carbs, 60.0);
        assert_eq!(totals.fat, 3.9);
        assert_eq!(meal_totals(&[]), MealTotals::default());
    }

    #[test]
    fn test_meal_requires_food() {
        let request: CreateMeal =
            serde_json::from_str(r#"{"meal_type":"lunch","foods":[]}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_nested_exercise_validation() {
        let request: CreateWorkout = serde_json::from_value(serde_json::json!({
            "name": "Leg day",
            "duration_minutes": 50,
            "exercises": [{ "name": "", "sets": 3, "reps": 12 }]
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }
}
