pub const RECIPE_COUNT_PER_PAGE: i64 = 10;
pub const INGREDIENT_COUNT_PER_PAGE: i64 = 100;

pub const MIN_UNIT: i32 = 1;
pub const MINUTES_IN_DAY: i32 = 1440;

pub const MAX_NAME_LENGTH: usize = 200;

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
