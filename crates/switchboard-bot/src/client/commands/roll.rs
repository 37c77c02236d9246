use std::str::FromStr;

use rand::Rng;
use switchboard::ratelimit;

use super::prelude::*;

const COMMON: &[&str] = &["1d20", "1d6", "2d6", "4d6", "1d4", "1d8", "1d10", "1d12", "1d100"];
const MAX_COUNT: u32 = 100;
const MAX_SIDES: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dice {
    count: u32,
    sides: u32,
    bonus: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
enum DiceError {
    #[error("Expected dice like 2d6 or 1d20+3")]
    Syntax,
    #[error("Roll between 1 and {MAX_COUNT} dice at once")]
    Count,
    #[error("Dice must have between 2 and {MAX_SIDES} sides")]
    Sides,
}

impl FromStr for Dice {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (dice, bonus) = match s.find(|c: char| c == '+' || c == '-') {
            Some(i) => (&s[..i], s[i..].parse().map_err(|_| DiceError::Syntax)?),
            None => (s.as_str(), 0),
        };
        let (count, sides) = dice.split_once('d').ok_or(DiceError::Syntax)?;
        let count = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| DiceError::Syntax)?
        };
        let sides = sides.parse().map_err(|_| DiceError::Syntax)?;

        if !(1..=MAX_COUNT).contains(&count) {
            return Err(DiceError::Count);
        }
        if !(2..=MAX_SIDES).contains(&sides) {
            return Err(DiceError::Sides);
        }

        Ok(Self {
            count,
            sides,
            bonus,
        })
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            count,
            sides,
            bonus,
        } = *self;
        write!(f, "{count}d{sides}")?;
        if bonus != 0 {
            write!(f, "{bonus:+}")?;
        }
        Ok(())
    }
}

impl Dice {
    fn roll(self, rng: &mut impl Rng) -> (Vec<u32>, i64) {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides))
            .collect();
        let total = rolls.iter().map(|&r| i64::from(r)).sum::<i64>() + self.bonus;
        (rolls, total)
    }
}

#[derive(Debug)]
pub struct Roll;

impl Roll {
    pub fn define() -> CreateCommand {
        CreateCommand::new("roll")
            .description("Roll some dice")
            .add_option(
                CreateCommandOption::new(CommandOptionType::SubCommand, "dice", "Roll dice")
                    .add_sub_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "spec",
                            "The dice to roll, e.g. 2d6+1",
                        )
                        .required(true)
                        .set_autocomplete(true),
                    ),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "help",
                "Explain dice notation",
            ))
    }
}

impl LimitedCommand for Roll {
    fn burst(&self) -> u32 { 3 }

    fn restoration(&self) -> Duration { Duration::from_secs(10) }
}

impl HelpProvider for Roll {
    fn help(&self, _: &SubCommandCtx<'_, '_>) -> Result<Embed> {
        Ok(Embed::default()
            .title("/roll")
            .desc_plain("Rolls dice written in NdM+K notation.")
            .field("2d6", "Two six-sided dice", true)
            .field("d20+5", "One twenty-sided die, plus five", true)
            .footer(format!(
                "Up to {MAX_COUNT} dice with up to {MAX_SIDES} sides each"
            )))
    }
}

#[async_trait::async_trait]
impl Autocomplete for Roll {
    async fn complete(&self, ctx: &mut AutocompleteCtx<'_>) -> Result<Vec<Completion>> {
        let input = ctx.input("spec").unwrap_or_default().trim();

        let parsed = input.parse::<Dice>().ok().map(|d| d.to_string());
        let common: Vec<_> = COMMON
            .iter()
            .filter(|&&c| c.starts_with(input) && parsed.as_deref() != Some(c))
            .map(|&c| c.to_owned())
            .collect();

        Ok(parsed
            .into_iter()
            .chain(common)
            .map(Completion::plain)
            .collect())
    }
}

#[async_trait::async_trait]
impl Command for Roll {
    fn name(&self) -> &str { "roll" }

    fn description(&self) -> &str { "Roll some dice" }

    fn as_autocomplete(&self) -> Option<&dyn Autocomplete> { Some(self) }

    fn as_limited(&self) -> Option<&dyn LimitedCommand> { Some(self) }

    fn as_help_provider(&self) -> Option<&dyn HelpProvider> { Some(self) }

    async fn run(&self, ctx: &mut Ctx<'_>) -> Result {
        let spec = ctx
            .sub_command()
            .and_then(|s| s.options().by_name("spec")?.as_str().map(ToOwned::to_owned))
            .ok_or_else(|| anyhow!("Missing dice spec"))?;

        let dice = match spec.parse::<Dice>() {
            Ok(d) => d,
            Err(e) => {
                ratelimit::skip(ctx);
                ctx.respond_error(&e.to_string(), "Invalid Dice").await?;
                return Ok(());
            },
        };

        let (rolls, total) = dice.roll(&mut rand::thread_rng());
        debug!(%dice, total, "Rolled dice");

        let detail = rolls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        ctx.respond_embed(
            Embed::default()
                .title(format!("🎲 {dice}: {total}"))
                .desc_plain(detail),
        )
        .await?;
        Ok(())
    }
}
