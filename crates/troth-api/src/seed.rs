//! Starter template catalog, installed by `server --seed-templates`.

use troth_core::{store::ContractStore, template::NewTemplate};

fn starter(title: &str, content: &str, description: &str, category: &str) -> NewTemplate {
  NewTemplate {
    title:       title.to_string(),
    content:     content.to_string(),
    description: Some(description.to_string()),
    category:    Some(category.to_string()),
    is_public:   true,
  }
}

fn starter_templates() -> Vec<NewTemplate> {
  vec![
    starter(
      "Loyalty Agreement",
      "Article 1: Both partners commit to staying loyal to each other.\n\n\
       Article 2: Neither party will pursue emotional or physical intimacy \
       outside the relationship.\n\n\
       Article 3: Both parties will respect each other's social media \
       accounts and privacy.\n\n\
       Article 4: Transparency is fundamental; both parties commit to \
       honesty with one another.\n\n\
       Article 5: If this agreement is broken, both parties will listen \
       with understanding and work toward a solution.",
      "A comprehensive template establishing ground rules for a \
       relationship built on loyalty and trust",
      "relationship",
    ),
    starter(
      "Shared Expenses Agreement",
      "Article 1: Shared expenses\n- Rent or mortgage payments\n\
       - Utilities (electricity, water, gas, internet)\n- Groceries\n\
       - Jointly used household items\n\n\
       Article 2: Contribution split\n- Shared costs are divided in \
       proportion to each partner's income\n- Contributions are deposited \
       into the joint account at the start of each month\n\n\
       Article 3: Personal expenses\n- Individual purchases\n- Personal \
       hobbies\n- Personal care\n\n\
       Article 4: Savings plan\n- Monthly joint savings target\n\
       - Building an emergency fund",
      "A detailed agreement for managing and splitting a couple's \
       financial obligations",
      "financial",
    ),
    starter(
      "Romantic Calendar",
      "Article 1: Special days\n- Anniversaries\n- Birthdays\n- The day we \
       met\n- Valentine's Day\n\n\
       Article 2: Monthly activities\n- At least one romantic dinner\n\
       - One weekend outing\n- A movie night\n\n\
       Article 3: Surprises and gifts\n- Gifts on special days\n\
       - Spontaneous surprises\n\n\
       Article 4: Shared hobbies\n- Activities to do together\n\
       - Planning new experiences",
      "A detailed calendar agreement for planning special days and \
       romantic activities",
      "activities",
    ),
    starter(
      "Vacation & Travel Plan",
      "Article 1: Annual vacation planning\n- At least one long vacation \
       per year (a week or more)\n- Two short weekend getaways\n\n\
       Article 2: Choosing destinations\n- Both partners' preferences are \
       considered\n- Budget planning\n- Reservations are made together\n\n\
       Article 3: Vacation budget\n- Accommodation\n- Transport\n\
       - Activities, food and drink\n\n\
       Article 4: Responsibilities\n- Planning and organisation\n\
       - Reservations\n- Travel insurance",
      "A comprehensive agreement template for organising a couple's \
       vacation and travel plans",
      "travel",
    ),
    starter(
      "Relationship Boundaries & Rules",
      "Article 1: Communication rules\n- Keeping communication regular\n\
       - How disagreements are resolved\n- Active listening and empathy\n\n\
       Article 2: Personal space and time\n- Time for individual \
       activities\n- Time with friends\n- Respect for hobbies and \
       interests\n\n\
       Article 3: Social media use\n- Posting boundaries\n- Privacy \
       rules\n- Criteria for sharing photos together\n\n\
       Article 4: Family and friends\n- How often families are visited\n\
       - Managing a shared circle of friends\n- Expectations around \
       special occasions",
      "A detailed template defining the core rules, boundaries, and \
       expectations of a relationship",
      "boundaries",
    ),
  ]
}

/// Install the starter catalog if no public template exists yet.
/// Returns how many templates were inserted.
pub async fn seed_templates<S>(store: &S) -> Result<usize, S::Error>
where
  S: ContractStore,
{
  if !store.list_templates().await?.is_empty() {
    return Ok(0);
  }

  let templates = starter_templates();
  let count = templates.len();
  for template in templates {
    store.create_template(template).await?;
  }
  Ok(count)
}

#[cfg(test)]
mod tests {
  use troth_store_sqlite::SqliteStore;

  use super::seed_templates;
  use troth_core::store::ContractStore;

  #[tokio::test]
  async fn seeding_is_idempotent() {
    let store = SqliteStore::open_in_memory().await.unwrap();

    assert_eq!(seed_templates(&store).await.unwrap(), 5);
    assert_eq!(seed_templates(&store).await.unwrap(), 0);
    assert_eq!(store.list_templates().await.unwrap().len(), 5);
  }
}
