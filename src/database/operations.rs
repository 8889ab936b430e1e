/// Database operations for storing weather observation summaries
use crate::database::connection::execute_with_retry;
use crate::models::ObservationSummary;

/// Store one publish window of observations in the weather_observation table
///
/// Uses the retry mechanism to ride out transient connection problems.
///
/// # Arguments
/// * `summary` - Averaged observations of the window
/// * `database_url` - PostgreSQL connection string
///
/// # Returns
/// Result indicating success or failure
pub async fn store_observation_summary(
    summary: &ObservationSummary,
    database_url: &str,
) -> Result<(), String> {
    let summary = summary.clone();

    execute_with_retry(database_url, move |client| {
        let summary = summary.clone();
        async move {
            client.execute(
                "INSERT INTO weather_observation(observation_time, temperature1, temperature2, humidity, pressure, co2, tvoc, wind_gust, wind_average, precipitation, samples)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &[
                    &summary.time,
                    &summary.temperature1,
                    &summary.temperature2,
                    &summary.relative_humidity,
                    &summary.barometric_pressure,
                    &summary.co2,
                    &summary.tvoc,
                    &summary.wind_gust,
                    &summary.wind_average,
                    &summary.precipitation,
                    &summary.samples,
                ],
            ).await
        }
    }).await
}
