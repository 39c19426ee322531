use jungle_quest_core::SessionBuilder;
use jungle_quest_model::ModelProvider;

/// A story the guide can tell: its rules, the first thing the player
/// reads, and optionally a first move made on the player's behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Scenario {
    /// Short name used to pick the scenario on the command line.
    pub name: &'static str,
    /// Title shown when the game starts.
    pub title: &'static str,
    /// The game rules sent as the system turn.
    pub system_prompt: &'static str,
    /// The guide's first message.
    pub welcome_message: &'static str,
    /// Input submitted before the player types anything.
    pub opening_move: Option<&'static str>,
}

impl Scenario {
    /// The search for the crown of Quetzalcoatl. The player speaks first.
    pub const AMAZON_RAINFOREST: Scenario = Scenario {
        name: "amazon",
        title: "Choose Your Own Adventure: Jungle Quest!",
        system_prompt: include_str!("./prompts/amazon_rainforest.md"),
        welcome_message: include_str!("./prompts/amazon_rainforest_welcome.md"),
        opening_move: None,
    };

    /// The search for the Crown of Hope. The guide opens the story.
    pub const JUBILEE_JUNGLE: Scenario = Scenario {
        name: "jubilee",
        title: "The Jubilee Jungle",
        system_prompt: include_str!("./prompts/jubilee_jungle.md"),
        welcome_message: include_str!("./prompts/jubilee_jungle_welcome.md"),
        opening_move: Some("Begin the adventure."),
    };

    /// Returns every built-in scenario.
    #[inline]
    pub fn all() -> &'static [Scenario] {
        &[Self::AMAZON_RAINFOREST, Self::JUBILEE_JUNGLE]
    }

    /// Looks up a scenario by name, ignoring case.
    pub fn by_name(name: &str) -> Option<Scenario> {
        Self::all()
            .iter()
            .find(|scenario| scenario.name.eq_ignore_ascii_case(name.trim()))
            .copied()
    }

    /// Creates a session builder preloaded with this scenario's rules and
    /// welcome message.
    pub fn session_builder<P: ModelProvider + 'static>(
        &self,
        provider: P,
    ) -> SessionBuilder {
        SessionBuilder::with_model_provider(provider)
            .with_system_prompt(self.system_prompt.trim())
            .with_welcome_message(self.welcome_message.trim())
    }
}

impl Default for Scenario {
    #[inline]
    fn default() -> Self {
        Self::AMAZON_RAINFOREST
    }
}
