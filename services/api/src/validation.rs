//! Input validation for users and recipes
//!
//! Everything here is pure: checks that need the database (unknown ids,
//! taken e-mails) happen in the handlers.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::{
    error::FieldErrors,
    image::{DecodedImage, decode_data_uri},
    models::{CreateUserRequest, NewUser, RecipeRequest},
};

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_NAME_LENGTH: usize = 150;
pub const MAX_RECIPE_NAME_LENGTH: usize = 256;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
/// Largest value an INTEGER column holds
pub const MAX_AMOUNT: i64 = i32::MAX as i64;
pub const MAX_COOKING_TIME: i64 = i32::MAX as i64;
pub const MAX_TAG_LENGTH: usize = 32;
pub const MAX_INGREDIENT_NAME_LENGTH: usize = 128;
pub const MAX_UNIT_LENGTH: usize = 64;

const REQUIRED: &str = "This field is required.";

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err(REQUIRED.to_string());
    }

    if username.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Username must be at most {} characters long",
            MAX_NAME_LENGTH
        ));
    }

    if username == "me" {
        return Err("Username \"me\" is reserved".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err(
            "Username can only contain letters, digits and the characters . @ + - _".to_string(),
        );
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err(REQUIRED.to_string());
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(format!(
            "Email must be at most {} characters long",
            MAX_EMAIL_LENGTH
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err(REQUIRED.to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        ));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("Password must not be entirely numeric".to_string());
    }

    Ok(())
}

fn validate_person_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(REQUIRED.to_string());
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Must be at most {} characters long",
            MAX_NAME_LENGTH
        ));
    }
    Ok(())
}

/// Validate a registration payload
pub fn validate_new_user(request: CreateUserRequest) -> Result<NewUser, FieldErrors> {
    let mut errors = FieldErrors::new();

    let email = request.email.unwrap_or_default().trim().to_lowercase();
    let username = request.username.unwrap_or_default().trim().to_string();
    let first_name = request.first_name.unwrap_or_default().trim().to_string();
    let last_name = request.last_name.unwrap_or_default().trim().to_string();
    let password = request.password.unwrap_or_default();

    if let Err(e) = validate_email(&email) {
        push(&mut errors, "email", e);
    }
    if let Err(e) = validate_username(&username) {
        push(&mut errors, "username", e);
    }
    if let Err(e) = validate_person_name(&first_name) {
        push(&mut errors, "first_name", e);
    }
    if let Err(e) = validate_person_name(&last_name) {
        push(&mut errors, "last_name", e);
    }
    if let Err(e) = validate_password(&password) {
        push(&mut errors, "password", e);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewUser {
        email,
        username,
        first_name,
        last_name,
        password,
    })
}

/// Recipe payload after validation
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    /// `(ingredient_id, amount)` in request order
    pub ingredients: Vec<(i64, i32)>,
    pub tags: Vec<i64>,
    /// Absent on updates that keep the current image
    pub image: Option<DecodedImage>,
}

impl RecipeDraft {
    pub fn ingredient_ids(&self) -> Vec<i64> {
        self.ingredients.iter().map(|(id, _)| *id).collect()
    }
}

fn validate_ingredients(
    ingredients: Option<Vec<crate::models::IngredientAmount>>,
    errors: &mut FieldErrors,
) -> Vec<(i64, i32)> {
    let Some(ingredients) = ingredients else {
        push(errors, "ingredients", REQUIRED);
        return Vec::new();
    };
    if ingredients.is_empty() {
        push(errors, "ingredients", "At least one ingredient is required.");
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(ingredients.len());
    for item in ingredients {
        if !seen.insert(item.id) {
            push(errors, "ingredients", "Ingredients must not repeat.");
            continue;
        }
        if item.amount < 1 {
            push(errors, "ingredients", "Ingredient amount must be at least 1.");
            continue;
        }
        if item.amount > MAX_AMOUNT {
            push(
                errors,
                "ingredients",
                format!("Ingredient amount must be at most {}.", MAX_AMOUNT),
            );
            continue;
        }
        valid.push((item.id, item.amount as i32));
    }
    valid
}

fn validate_tags(tags: Option<Vec<i64>>, errors: &mut FieldErrors) -> Vec<i64> {
    let Some(tags) = tags else {
        push(errors, "tags", REQUIRED);
        return Vec::new();
    };
    if tags.is_empty() {
        push(errors, "tags", "At least one tag is required.");
        return Vec::new();
    }

    let mut seen = HashSet::new();
    if tags.iter().any(|id| !seen.insert(*id)) {
        push(errors, "tags", "Tags must not repeat.");
    }
    tags
}

/// Validate a recipe create (`require_image`) or update payload
pub fn validate_recipe(
    request: RecipeRequest,
    require_image: bool,
) -> Result<RecipeDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    let ingredients = validate_ingredients(request.ingredients, &mut errors);
    let tags = validate_tags(request.tags, &mut errors);

    let name = request.name.unwrap_or_default().trim().to_string();
    if name.is_empty() {
        push(&mut errors, "name", REQUIRED);
    } else if name.chars().count() > MAX_RECIPE_NAME_LENGTH {
        push(
            &mut errors,
            "name",
            format!("Must be at most {} characters long", MAX_RECIPE_NAME_LENGTH),
        );
    }

    let text = request.text.unwrap_or_default();
    if text.trim().is_empty() {
        push(&mut errors, "text", REQUIRED);
    }

    let cooking_time = match request.cooking_time {
        None => {
            push(&mut errors, "cooking_time", REQUIRED);
            0
        }
        Some(minutes) if minutes < 1 => {
            push(&mut errors, "cooking_time", "Cooking time must be at least 1 minute.");
            0
        }
        Some(minutes) if minutes > MAX_COOKING_TIME => {
            push(
                &mut errors,
                "cooking_time",
                format!("Cooking time must be at most {} minutes.", MAX_COOKING_TIME),
            );
            0
        }
        Some(minutes) => minutes as i32,
    };

    let image = match request.image.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => match decode_data_uri(value) {
            Ok(image) => Some(image),
            Err(e) => {
                push(&mut errors, "image", e.to_string());
                None
            }
        },
        _ => {
            if require_image {
                push(&mut errors, "image", REQUIRED);
            }
            None
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(RecipeDraft {
        name,
        text,
        cooking_time,
        ingredients,
        tags,
        image,
    })
}

/// Validate a tag record for import
pub fn validate_tag(name: &str, slug: &str) -> Result<(), String> {
    if name.trim().is_empty() || name.chars().count() > MAX_TAG_LENGTH {
        return Err(format!("Tag name must be 1 to {} characters", MAX_TAG_LENGTH));
    }

    static SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex =
        SLUG_REGEX.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("Failed to compile slug regex"));

    if slug.len() > MAX_TAG_LENGTH || !regex.is_match(slug) {
        return Err(format!("Invalid tag slug {:?}", slug));
    }

    Ok(())
}

/// Validate an ingredient record for import
pub fn validate_ingredient(name: &str, measurement_unit: &str) -> Result<(), String> {
    if name.trim().is_empty() || name.chars().count() > MAX_INGREDIENT_NAME_LENGTH {
        return Err(format!(
            "Ingredient name must be 1 to {} characters",
            MAX_INGREDIENT_NAME_LENGTH
        ));
    }
    if measurement_unit.trim().is_empty() || measurement_unit.chars().count() > MAX_UNIT_LENGTH {
        return Err(format!(
            "Measurement unit must be 1 to {} characters",
            MAX_UNIT_LENGTH
        ));
    }
    Ok(())
}
