//! Sowing and harvest date resolution.
//!
//! Each supported (sowing policy, harvest policy) pair maps to one rule in
//! [`RULES`]. A rule receives the dates selected by the two policies and
//! writes the sowing and harvest worksteps. Pairs without a rule, missing
//! records and unusable template dates all leave the template worksteps
//! unchanged.
//!
//! Day-of-year math happens in the non-leap year 2001 and results are
//! anchored at December 31st of the previous year, so offsets past the end
//! of the year roll into January.

use sim_common::{HarvestPolicy, RelativeDate, SimResult, SowingPolicy};
use tracing::debug;

use crate::record::PhenologyRecord;

/// Date fields of a sowing or harvest workstep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkstepDates {
    pub date: Option<String>,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
}

/// Sowing and harvest workstep dates after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub sowing: WorkstepDates,
    pub harvest: WorkstepDates,
}

/// Everything a rule may read.
struct Context<'a> {
    record: &'a PhenologyRecord,
    is_winter_crop: bool,
    /// Date chosen by the sowing policy
    sowing: RelativeDate,
    sdoy: i64,
    /// Date chosen by the harvest policy
    harvest: RelativeDate,
    hdoy: i64,
}

impl Context<'_> {
    /// Harvest date clamped before the next sowing for winter crops,
    /// expressed in the harvest date's year.
    fn calc_harvest_date(&self) -> SimResult<RelativeDate> {
        calc_harvest_date(self.sdoy, self.hdoy, self.harvest.year, self.is_winter_crop)
    }

    /// Earliest sowing: the record's date if after June 20, else June 20
    /// of the sowing year.
    fn earliest_sowing_date(&self) -> SimResult<RelativeDate> {
        let june_20 = RelativeDate::new(self.sowing.year, 6, 20)?;
        let earliest = self.record.earliest_sowing_date;
        if earliest.day_of_year()? > june_20.day_of_year()? {
            Ok(earliest)
        } else {
            Ok(june_20)
        }
    }

    /// Latest sowing: the day after harvest unless the selected sowing day
    /// is later, expressed in the sowing year.
    fn latest_sowing_date(&self) -> SimResult<RelativeDate> {
        RelativeDate::from_reference_offset(self.sowing.year, (self.hdoy + 1).max(self.sdoy))
    }
}

type Rule = fn(&Context<'_>, &mut Resolution) -> SimResult<()>;

/// Supported policy pairs.
const RULES: &[((SowingPolicy, HarvestPolicy), Rule)] = &[
    ((SowingPolicy::Fixed, HarvestPolicy::Fixed), fixed_fixed),
    ((SowingPolicy::Fixed, HarvestPolicy::Auto), fixed_auto),
    ((SowingPolicy::Fixed, HarvestPolicy::Auto1), fixed_auto1),
    ((SowingPolicy::Auto, HarvestPolicy::Fixed), auto_fixed),
    ((SowingPolicy::Auto, HarvestPolicy::Auto), auto_auto),
    ((SowingPolicy::Fixed1, HarvestPolicy::Fixed), fixed1_fixed),
];

fn fixed_fixed(ctx: &Context<'_>, out: &mut Resolution) -> SimResult<()> {
    out.sowing.date = Some(ctx.record.sowing_date.to_string());
    out.harvest.date = Some(ctx.calc_harvest_date()?.to_string());
    Ok(())
}

fn fixed_auto(ctx: &Context<'_>, out: &mut Resolution) -> SimResult<()> {
    out.sowing.date = Some(ctx.record.sowing_date.to_string());
    out.harvest.latest_date = Some(ctx.calc_harvest_date()?.to_string());
    Ok(())
}

fn fixed_auto1(ctx: &Context<'_>, out: &mut Resolution) -> SimResult<()> {
    out.sowing.date = Some(ctx.record.sowing_date.to_string());
    out.harvest.latest_date = Some(ctx.harvest.to_string());
    Ok(())
}

fn auto_fixed(ctx: &Context<'_>, out: &mut Resolution) -> SimResult<()> {
    out.sowing.earliest_date = Some(ctx.earliest_sowing_date()?.to_string());
    out.sowing.latest_date = Some(ctx.latest_sowing_date()?.to_string());
    out.harvest.date = Some(ctx.record.harvest_date.to_string());
    Ok(())
}

fn auto_auto(ctx: &Context<'_>, out: &mut Resolution) -> SimResult<()> {
    out.sowing.earliest_date = Some(ctx.earliest_sowing_date()?.to_string());
    out.sowing.latest_date = Some(ctx.latest_sowing_date()?.to_string());
    out.harvest.latest_date = Some(ctx.calc_harvest_date()?.to_string());
    Ok(())
}

fn fixed1_fixed(ctx: &Context<'_>, out: &mut Resolution) -> SimResult<()> {
    out.sowing.date = Some(ctx.sowing.to_string());
    out.harvest.date = Some(ctx.calc_harvest_date()?.to_string());
    Ok(())
}

/// Harvest date for a sowing day `sdoy` and harvest day `hdoy`.
///
/// Winter crops are harvested no later than the day before sowing.
pub fn calc_harvest_date(
    sdoy: i64,
    hdoy: i64,
    harvest_year: i32,
    is_winter_crop: bool,
) -> SimResult<RelativeDate> {
    let doy = if is_winter_crop {
        hdoy.min(sdoy - 1)
    } else {
        hdoy
    };
    RelativeDate::from_reference_offset(harvest_year, doy)
}

/// Resolve sowing and harvest workstep dates.
///
/// `template` holds the worksteps as configured. The result starts as a
/// copy of it and is only changed when a rule for the policy pair exists
/// and all dates it needs are available.
pub fn resolve(
    sowing_policy: SowingPolicy,
    harvest_policy: HarvestPolicy,
    record: Option<&PhenologyRecord>,
    template: &Resolution,
) -> Resolution {
    let Some(record) = record else {
        debug!("No phenology record for cell, keeping template dates");
        return template.clone();
    };

    let Some(rule) = RULES
        .iter()
        .find(|(pair, _)| *pair == (sowing_policy, harvest_policy))
        .map(|(_, rule)| *rule)
    else {
        debug!(
            sowing_policy = %sowing_policy,
            harvest_policy = %harvest_policy,
            "Unsupported policy pair, keeping template dates"
        );
        return template.clone();
    };

    match apply(rule, sowing_policy, harvest_policy, record, template) {
        Ok(resolution) => resolution,
        Err(e) => {
            debug!(
                cluster_id = record.cluster_id,
                error = %e,
                "Cannot resolve dates, keeping template dates"
            );
            template.clone()
        }
    }
}

fn apply(
    rule: Rule,
    sowing_policy: SowingPolicy,
    harvest_policy: HarvestPolicy,
    record: &PhenologyRecord,
    template: &Resolution,
) -> SimResult<Resolution> {
    let sowing = match sowing_policy {
        SowingPolicy::Fixed => record.sowing_date,
        SowingPolicy::Auto => record.latest_sowing_date,
        SowingPolicy::Fixed1 => parse_template_date(template.sowing.date.as_deref(), "sowing date")?,
    };
    let harvest = match harvest_policy {
        HarvestPolicy::Fixed => record.harvest_date,
        HarvestPolicy::Auto => record.latest_harvest_date,
        HarvestPolicy::Auto1 => {
            parse_template_date(template.harvest.latest_date.as_deref(), "latest harvest date")?
        }
    };

    let ctx = Context {
        record,
        is_winter_crop: record.is_winter_crop,
        sdoy: i64::from(sowing.day_of_year()?),
        sowing,
        hdoy: i64::from(harvest.day_of_year()?),
        harvest,
    };

    let mut out = template.clone();
    rule(&ctx, &mut out)?;
    Ok(out)
}

fn parse_template_date(value: Option<&str>, what: &str) -> SimResult<RelativeDate> {
    match value {
        Some(s) => RelativeDate::parse(s),
        None => Err(sim_common::SimError::DataUnavailable(format!(
            "template has no {}",
            what
        ))),
    }
}
