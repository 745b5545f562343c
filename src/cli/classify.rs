use crate::categorizer::{categorize, is_new_signup, membership_type};
use crate::error::Result;
use crate::models::Category;

pub fn run(description: &str) -> Result<()> {
    let category = categorize(description);
    println!("Category:   {}", category.key());
    if category == Category::MembershipOrAdmin && description.to_lowercase().contains("membership") {
        println!("Membership: {}", membership_type(description).key());
        println!("New:        {}", if is_new_signup(description) { "yes" } else { "no" });
    }
    Ok(())
}
