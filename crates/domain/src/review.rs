//! Product reviews. One review per user and product.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{ProductId, ReviewId, UserId};
use serde::{Deserialize, Serialize};
use store::{NewReview, Review, ReviewPatch, Store, StoreError};

use crate::DomainError;

const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub user_name: String,
    pub rating: u8,
    pub title: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            product_id: review.product_id,
            user_id: review.user_id,
            user_name: review.user_name.unwrap_or_else(|| ANONYMOUS.to_string()),
            rating: review.rating,
            title: review.title,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

/// A product's reviews with statistics computed at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReviews {
    pub product_id: ProductId,
    /// Zero when there are no reviews.
    pub average_rating: f64,
    pub total_reviews: usize,
    /// Count per star rating; every bucket from 1 to 5 is present.
    pub rating_distribution: BTreeMap<u8, usize>,
    pub reviews: Vec<ReviewView>,
}

impl ProductReviews {
    fn summarize(product_id: ProductId, reviews: Vec<Review>) -> Self {
        let mut rating_distribution: BTreeMap<u8, usize> = (1..=5).map(|r| (r, 0)).collect();
        for review in &reviews {
            *rating_distribution.entry(review.rating).or_default() += 1;
        }

        let total_reviews = reviews.len();
        let average_rating = if total_reviews == 0 {
            0.0
        } else {
            let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
            f64::from(sum) / total_reviews as f64
        };

        Self {
            product_id,
            average_rating,
            total_reviews,
            rating_distribution,
            reviews: reviews.into_iter().map(ReviewView::from).collect(),
        }
    }
}

/// Create or update input. `rating` is validated server-side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub rating: i64,
    pub title: Option<String>,
    pub comment: Option<String>,
}

fn check_rating(rating: i64) -> Result<u8, DomainError> {
    match u8::try_from(rating) {
        Ok(r @ 1..=5) => Ok(r),
        _ => Err(DomainError::InvalidRating(rating)),
    }
}

#[derive(Clone)]
pub struct ReviewService<S: Store> {
    store: S,
}

impl<S: Store> ReviewService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product_reviews(
        &self,
        product_id: ProductId,
    ) -> Result<ProductReviews, DomainError> {
        let reviews = self.store.list_reviews_for_product(product_id).await?;
        Ok(ProductReviews::summarize(product_id, reviews))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_review(&self, id: ReviewId) -> Result<ReviewView, DomainError> {
        self.store
            .get_review(id)
            .await?
            .map(ReviewView::from)
            .ok_or_else(|| DomainError::not_found("Review", id))
    }

    /// Reviews a product. The product must exist, the user must not have
    /// reviewed it yet, and the rating must be within 1..=5, checked in that order.
    #[tracing::instrument(skip(self, input), fields(rating = input.rating))]
    pub async fn create_review(
        &self,
        user_id: UserId,
        product_id: ProductId,
        input: ReviewInput,
    ) -> Result<ReviewView, DomainError> {
        if self.store.get_product(product_id).await?.is_none() {
            return Err(DomainError::not_found("Product", product_id));
        }
        if self.store.find_review(user_id, product_id).await?.is_some() {
            return Err(DomainError::DuplicateReview);
        }
        let rating = check_rating(input.rating)?;

        let review = self
            .store
            .insert_review(NewReview {
                product_id,
                user_id,
                rating,
                title: input.title,
                comment: input.comment,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent create
                StoreError::UniqueViolation(_) => DomainError::DuplicateReview,
                other => other.into(),
            })?;

        tracing::info!(review_id = %review.id, "review created");
        Ok(review.into())
    }

    #[tracing::instrument(skip(self, input), fields(rating = input.rating))]
    pub async fn update_review(
        &self,
        user_id: UserId,
        id: ReviewId,
        input: ReviewInput,
    ) -> Result<ReviewView, DomainError> {
        let review = self
            .store
            .get_review(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Review", id))?;
        if review.user_id != user_id {
            return Err(DomainError::Forbidden);
        }
        let rating = check_rating(input.rating)?;

        let patch = ReviewPatch {
            rating,
            title: input.title,
            comment: input.comment,
        };
        self.store
            .update_review(id, patch)
            .await?
            .map(ReviewView::from)
            .ok_or_else(|| DomainError::not_found("Review", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_review(&self, user_id: UserId, id: ReviewId) -> Result<(), DomainError> {
        let review = self
            .store
            .get_review(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Review", id))?;
        if review.user_id != user_id {
            return Err(DomainError::Forbidden);
        }

        self.store.delete_review(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;
    use store::{InMemoryStore, NewProduct};

    use super::*;

    async fn setup() -> (ReviewService<InMemoryStore>, ProductId) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct {
                name: "Mat".to_string(),
                price: Money::from_cents(2500),
                stock_quantity: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        (ReviewService::new(store), product.id)
    }

    fn input(rating: i64) -> ReviewInput {
        ReviewInput {
            rating,
            ..Default::default()
        }
    }

    #[test]
    fn rating_bounds() {
        assert!(check_rating(0).is_err());
        assert!(check_rating(6).is_err());
        assert!(check_rating(-1).is_err());
        assert!(check_rating(300).is_err());
        assert_eq!(check_rating(1).unwrap(), 1);
        assert_eq!(check_rating(5).unwrap(), 5);
    }

    #[tokio::test]
    async fn missing_product_is_checked_first() {
        let (service, _) = setup().await;
        let result = service
            .create_review(UserId::new(1), ProductId::new(999), input(9))
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { entity: "Product", .. })));
    }

    #[tokio::test]
    async fn duplicate_is_checked_before_rating() {
        let (service, product) = setup().await;
        let user = UserId::new(1);
        service.create_review(user, product, input(4)).await.unwrap();

        let result = service.create_review(user, product, input(9)).await;
        assert!(matches!(result, Err(DomainError::DuplicateReview)));
    }

    #[tokio::test]
    async fn unnamed_users_are_anonymous() {
        let (service, product) = setup().await;
        let review = service
            .create_review(UserId::new(1), product, input(5))
            .await
            .unwrap();
        assert_eq!(review.user_name, "Anonymous");
    }

    #[tokio::test]
    async fn only_the_author_may_edit_or_delete() {
        let (service, product) = setup().await;
        let author = UserId::new(1);
        let other = UserId::new(2);
        let review = service.create_review(author, product, input(3)).await.unwrap();

        assert!(matches!(
            service.update_review(other, review.id, input(5)).await,
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            service.delete_review(other, review.id).await,
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            service.update_review(author, review.id, input(0)).await,
            Err(DomainError::InvalidRating(0))
        ));

        let updated = service.update_review(author, review.id, input(5)).await.unwrap();
        assert_eq!(updated.rating, 5);

        service.delete_review(author, review.id).await.unwrap();
        assert!(matches!(
            service.get_review(review.id).await,
            Err(DomainError::NotFound { entity: "Review", .. })
        ));
    }

    #[tokio::test]
    async fn statistics_include_every_bucket() {
        let (service, product) = setup().await;
        let empty = service.get_product_reviews(product).await.unwrap();
        assert_eq!(empty.average_rating, 0.0);
        assert_eq!(empty.rating_distribution.len(), 5);
        assert!(empty.rating_distribution.values().all(|&c| c == 0));

        service.create_review(UserId::new(1), product, input(4)).await.unwrap();
        service.create_review(UserId::new(2), product, input(5)).await.unwrap();

        let stats = service.get_product_reviews(product).await.unwrap();
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.average_rating, 4.5);
        assert_eq!(stats.rating_distribution[&4], 1);
        assert_eq!(stats.rating_distribution[&5], 1);
        assert_eq!(stats.rating_distribution[&1], 0);
    }
}
