use async_trait::async_trait;
use aws_sdk_amp::error::SdkError;
use aws_sdk_amp::operation::delete_scraper::{DeleteScraperError, DeleteScraperOutput};
use aws_sdk_amp::operation::list_scrapers::ListScrapersError;
use aws_sdk_amp::types::ScraperSummary;
use aws_types::SdkConfig;

#[async_trait]
pub trait SweeperAwsSdkAmp {
    async fn list_all_scrapers(&self) -> Result<Vec<ScraperSummary>, SdkError<ListScrapersError>>;
    async fn delete_scraper(&self, scraper_id: &str) -> Result<DeleteScraperOutput, SdkError<DeleteScraperError>>;
}

#[async_trait]
impl SweeperAwsSdkAmp for SdkConfig {
    async fn list_all_scrapers(&self) -> Result<Vec<ScraperSummary>, SdkError<ListScrapersError>> {
        let client = aws_sdk_amp::Client::new(self);
        let mut scrapers = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = client.list_scrapers().set_next_token(next_token).send().await?;
            scrapers.extend(output.scrapers);

            next_token = output.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(scrapers)
    }

    async fn delete_scraper(&self, scraper_id: &str) -> Result<DeleteScraperOutput, SdkError<DeleteScraperError>> {
        let client = aws_sdk_amp::Client::new(self);
        client.delete_scraper().scraper_id(scraper_id).send().await
    }
}
