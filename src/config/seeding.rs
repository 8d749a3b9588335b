use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use sqlx::PgPool;
use std::env;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::auth::UserRole;
use crate::config::AuthConfig;

struct SeedAccount {
    name: &'static str,
    email: String,
    password: String,
    role: UserRole,
}

struct SeedPlan {
    name: &'static str,
    description: &'static str,
    price: Decimal,
    duration_days: i32,
    sessions_count: i32,
    features: &'static [&'static str],
}

struct SeedProduct {
    name: &'static str,
    category: &'static str,
    price: Decimal,
    sale_price: Option<Decimal>,
    stock: i32,
    is_featured: bool,
}

const PLANS: &[SeedPlan] = &[
    SeedPlan {
        name: "Starter",
        description: "Four guided sessions to get moving",
        price: dec!(199.00),
        duration_days: 30,
        sessions_count: 4,
        features: &["4 private sessions", "Chat with your trainer"],
    },
    SeedPlan {
        name: "Progress",
        description: "Weekly coaching with meal guidance",
        price: dec!(349.00),
        duration_days: 30,
        sessions_count: 8,
        features: &["8 private sessions", "Meal plan review", "Chat with your trainer"],
    },
    SeedPlan {
        name: "Transform",
        description: "Three months of intensive coaching",
        price: dec!(899.00),
        duration_days: 90,
        sessions_count: 36,
        features: &["36 private sessions", "Meal plan review", "Monthly body assessment"],
    },
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        name: "Resistance Band Set",
        category: "equipment",
        price: dec!(89.00),
        sale_price: Some(dec!(69.00)),
        stock: 50,
        is_featured: true,
    },
    SeedProduct {
        name: "Yoga Mat",
        category: "equipment",
        price: dec!(120.00),
        sale_price: None,
        stock: 40,
        is_featured: false,
    },
    SeedProduct {
        name: "Whey Protein 1kg",
        category: "supplements",
        price: dec!(210.00),
        sale_price: None,
        stock: 25,
        is_featured: true,
    },
    SeedProduct {
        name: "Training Leggings",
        category: "apparel",
        price: dec!(150.00),
        sale_price: Some(dec!(119.00)),
        stock: 60,
        is_featured: false,
    },
];

/// Idempotent demo data: re-running only inserts what is missing
pub struct DatabaseSeeder {
    pool: PgPool,
    bcrypt_cost: u32,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool, auth: &AuthConfig) -> Self {
        Self {
            pool,
            bcrypt_cost: auth.bcrypt_cost,
        }
    }

    pub async fn seed_all(&self) -> Result<()> {
        tracing::info!("Starting database seeding...");

        let accounts = [
            SeedAccount {
                name: "VitaFit Admin",
                email: env::var("SEED_ADMIN_EMAIL")
                    .unwrap_or_else(|_| "admin@vitafit.online".to_string()),
                password: env::var("SEED_ADMIN_PASSWORD")
                    .unwrap_or_else(|_| "Admin@Vitafit1".to_string()),
                role: UserRole::Admin,
            },
            SeedAccount {
                name: "Coach Lina",
                email: env::var("SEED_TRAINER_EMAIL")
                    .unwrap_or_else(|_| "trainer@vitafit.online".to_string()),
                password: env::var("SEED_TRAINER_PASSWORD")
                    .unwrap_or_else(|_| "Trainer@Vitafit1".to_string()),
                role: UserRole::Trainer,
            },
        ];

        for account in &accounts {
            self.seed_account(account).await?;
        }
        self.seed_plans().await?;
        self.seed_products().await?;

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn seed_account(&self, account: &SeedAccount) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&account.email)
            .fetch_one(&self.pool)
            .await?;
        if exists {
            return Ok(());
        }

        let password_hash = hash_password(&account.password, self.bcrypt_cost)?;
        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, is_verified)
             VALUES ($1, $2, $3, $4, $5, TRUE)
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(user_id)
        .bind(account.name)
        .bind(&account.email)
        .bind(password_hash)
        .bind(account.role)
        .execute(&self.pool)
        .await?;

        if account.role == UserRole::Trainer {
            sqlx::query(
                "INSERT INTO trainer_profiles (user_id, specialization, bio, experience_years, max_trainees)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(user_id)
            .bind("Strength and weight loss")
            .bind("Certified personal trainer focused on women's fitness.")
            .bind(6)
            .bind(20)
            .execute(&self.pool)
            .await?;
        }

        tracing::info!(email = %account.email, role = account.role.as_str(), "Seeded account");
        Ok(())
    }

    async fn seed_plans(&self) -> Result<()> {
        for plan in PLANS {
            let inserted = sqlx::query(
                "INSERT INTO subscription_plans (id, name, description, price, duration_days, sessions_count, features)
                 SELECT $1, $2, $3, $4, $5, $6, $7
                 WHERE NOT EXISTS (SELECT 1 FROM subscription_plans WHERE name = $2)",
            )
            .bind(Uuid::new_v4())
            .bind(plan.name)
            .bind(plan.description)
            .bind(plan.price)
            .bind(plan.duration_days)
            .bind(plan.sessions_count)
            .bind(json!(plan.features))
            .execute(&self.pool)
            .await?
            .rows_affected();

            if inserted > 0 {
                tracing::info!(plan = plan.name, "Seeded subscription plan");
            }
        }
        Ok(())
    }

    async fn seed_products(&self) -> Result<()> {
        for product in PRODUCTS {
            let inserted = sqlx::query(
                "INSERT INTO products (id, name, category, price, sale_price, stock, is_featured)
                 SELECT $1, $2, $3, $4, $5, $6, $7
                 WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)",
            )
            .bind(Uuid::new_v4())
            .bind(product.name)
            .bind(product.category)
            .bind(product.price)
            .bind(product.sale_price)
            .bind(product.stock)
            .bind(product.is_featured)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if inserted > 0 {
                tracing::info!(product = product.name, "Seeded product");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::PasswordPolicy;

    #[test]
    fn test_seed_prices_respect_sale_rule() {
        for product in PRODUCTS {
            if let Some(sale) = product.sale_price {
                assert!(sale < product.price, "{} sale price", product.name);
            }
        }
    }

    #[test]
    fn test_default_seed_passwords_meet_policy() {
        let policy = PasswordPolicy::default();
        assert!(policy.is_valid("Admin@Vitafit1"));
        assert!(policy.is_valid("Trainer@Vitafit1"));
    }

    #[test]
    fn test_plans_have_sessions_and_duration() {
        assert!(PLANS.iter().all(|plan| plan.duration_days > 0 && plan.sessions_count > 0));
    }
}
