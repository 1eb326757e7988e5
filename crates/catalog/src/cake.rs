use serde::Serialize;

use cakestore_core::{CakeId, CategoryId, DomainError, DomainResult, Entity, Price};

use crate::discount::{Discount, DiscountTerms};

/// Cake name must be non-empty (after trimming).
pub fn validate_cake_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("cake name must not be empty"));
    }
    Ok(())
}

/// Aggregate root: Cake.
///
/// # Invariants
/// - `discount`, when present, is owned by this cake alone; replacing or
///   clearing it releases the previous row.
/// - `image_urls` keeps insertion order. It only grows by appending and only
///   shrinks through [`Cake::remove_image`].
/// - `category_id` is a reference, not a copy. It may dangle after the
///   category is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cake {
    pub id: CakeId,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub discount: Option<Discount>,
    pub image_urls: Vec<String>,
}

impl Entity for Cake {
    type Id = CakeId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Cake {
    /// Overwrite the scalar fields.
    pub fn set_details(
        &mut self,
        name: impl Into<String>,
        price: Price,
        description: impl Into<String>,
    ) -> DomainResult<()> {
        let name = name.into();
        validate_cake_name(&name)?;
        self.name = name;
        self.price = price;
        self.description = description.into();
        Ok(())
    }

    /// Attach a discount, reusing the existing record when there is one.
    pub fn apply_discount(&mut self, terms: DiscountTerms) {
        match self.discount.as_mut() {
            Some(existing) => existing.overwrite(terms),
            None => self.discount = Some(Discount::unsaved(terms)),
        }
    }

    /// Detach the discount. The returned record is released and must not be
    /// persisted again.
    pub fn clear_discount(&mut self) -> Option<Discount> {
        self.discount.take()
    }

    pub fn append_images<I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.image_urls.extend(urls);
    }

    /// Remove exactly one image URL by position.
    ///
    /// Out-of-range indices (including negative ones) leave the list
    /// untouched.
    pub fn remove_image(&mut self, index: i64) -> DomainResult<String> {
        let len = self.image_urls.len();
        match usize::try_from(index) {
            Ok(i) if i < len => Ok(self.image_urls.remove(i)),
            _ => Err(DomainError::validation("Invalid image index")),
        }
    }

    /// Case-insensitive substring match on the name.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// A cake that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCake {
    pub name: String,
    pub price: Price,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub discount: Option<DiscountTerms>,
    pub image_urls: Vec<String>,
}

impl NewCake {
    pub fn new(name: impl Into<String>, price: Price, description: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        validate_cake_name(&name)?;
        Ok(Self {
            name,
            price,
            description: description.into(),
            category_id: None,
            discount: None,
            image_urls: Vec::new(),
        })
    }

    /// Materialize with the store-assigned id. The discount stays unsaved
    /// (`id: None`) until the store assigns its own row id.
    pub fn into_cake(self, id: CakeId) -> Cake {
        Cake {
            id,
            name: self.name,
            price: self.price,
            description: self.description,
            category_id: self.category_id,
            discount: self.discount.map(Discount::unsaved),
            image_urls: self.image_urls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::DiscountType;
    use cakestore_core::DiscountId;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn price(units: i64) -> Price {
        Price::new(Decimal::new(units, 0)).unwrap()
    }

    fn cake_with_images(urls: &[&str]) -> Cake {
        let mut new = NewCake::new("Chocolate Dream", price(20), "rich").unwrap();
        new.image_urls = urls.iter().map(|u| u.to_string()).collect();
        new.into_cake(CakeId::new(1))
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(
            NewCake::new("", price(1), "").unwrap_err(),
            DomainError::validation("cake name must not be empty")
        );
    }

    #[test]
    fn set_details_rejects_blank_name_and_keeps_old_values() {
        let mut cake = cake_with_images(&[]);
        assert!(cake.set_details(" ", price(5), "x").is_err());
        assert_eq!(cake.name, "Chocolate Dream");
        assert_eq!(cake.price, price(20));
    }

    #[test]
    fn append_preserves_existing_order() {
        let mut cake = cake_with_images(&["a", "b"]);
        cake.append_images(vec!["c".to_string()]);
        assert_eq!(cake.image_urls, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_image_out_of_range_leaves_list_unchanged() {
        let mut cake = cake_with_images(&["a", "b"]);
        assert!(cake.remove_image(5).is_err());
        assert!(cake.remove_image(2).is_err());
        assert!(cake.remove_image(-1).is_err());
        assert_eq!(cake.image_urls, vec!["a", "b"]);
    }

    #[test]
    fn remove_image_removes_exactly_one() {
        let mut cake = cake_with_images(&["a", "b", "c"]);
        assert_eq!(cake.remove_image(1).unwrap(), "b");
        assert_eq!(cake.image_urls, vec!["a", "c"]);
    }

    #[test]
    fn apply_discount_reuses_existing_record() {
        let mut cake = cake_with_images(&[]);
        cake.apply_discount(DiscountTerms::new(DiscountType::Percentage, Decimal::new(10, 0)));
        cake.discount.as_mut().unwrap().id = Some(DiscountId::new(4));

        cake.apply_discount(DiscountTerms::new(DiscountType::Flat, Decimal::new(5, 0)));

        let discount = cake.discount.as_ref().unwrap();
        assert_eq!(discount.id, Some(DiscountId::new(4)));
        assert_eq!(discount.kind, DiscountType::Flat);
        assert_eq!(discount.value, Decimal::new(5, 0));
    }

    #[test]
    fn clear_discount_releases_record() {
        let mut cake = cake_with_images(&[]);
        cake.apply_discount(DiscountTerms::new(DiscountType::Flat, Decimal::ONE));
        assert!(cake.clear_discount().is_some());
        assert!(cake.discount.is_none());
        assert!(cake.clear_discount().is_none());
    }

    #[test]
    fn name_match_ignores_case() {
        let cake = cake_with_images(&[]);
        assert!(cake.name_contains("choc"));
        assert!(cake.name_contains("CHOC"));
        assert!(cake.name_contains("Dream"));
        assert!(!cake.name_contains("vanilla"));
    }

    proptest! {
        #[test]
        fn remove_image_shrinks_by_one_or_not_at_all(
            urls in proptest::collection::vec("[a-z]{1,8}", 0..8),
            index in -3i64..12,
        ) {
            let mut cake = cake_with_images(&[]);
            cake.image_urls = urls.clone();
            match cake.remove_image(index) {
                Ok(removed) => {
                    prop_assert_eq!(cake.image_urls.len(), urls.len() - 1);
                    prop_assert_eq!(&removed, &urls[index as usize]);
                }
                Err(_) => prop_assert_eq!(&cake.image_urls, &urls),
            }
        }

        #[test]
        fn any_slice_of_the_name_matches_in_any_case(
            name in "[A-Za-z ]{1,24}",
            start in 0usize..24,
            len in 1usize..24,
        ) {
            let start = start.min(name.len() - 1);
            let end = (start + len).min(name.len());
            let needle = &name[start..end];
            let mut cake = cake_with_images(&[]);
            cake.name = name.clone();
            prop_assert!(cake.name_contains(&needle.to_uppercase()));
            prop_assert!(cake.name_contains(&needle.to_lowercase()));
        }
    }
}
