use crate::brands::BrandProfile;

const CRITIQUE_PROMPT_HEADER: &str = r#"You are an expert Creative Director and Brand Compliance Officer.

Analyze this advertisement image for the brand: {brand_name}

BRAND GUIDELINES:
- Brand Colors: {brand_colors}
- Brand Tone: {brand_tone}
- Brand Logo: {brand_logo}
- Tagline: {brand_tagline}
"#;

const EVALUATION_CRITERIA: &str = r#"
EVALUATION CRITERIA:
Evaluate the ad on these 4 dimensions and give each a score from 0-100:

1. BRAND ALIGNMENT (0-100)
   - Are the brand colors present and used correctly?
   - Is the logo visible and properly placed?
   - Does the visual style match the brand tone?
   - Does it feel authentic to this brand?

2. VISUAL QUALITY (0-100)
   - Is the image sharp and clear?
   - Is the composition professional and balanced?
   - Is the lighting good?
   - Are there any distracting artifacts or watermarks?

3. MESSAGE CLARITY (0-100)
   - Is the product clearly visible?
   - Is there a clear value proposition or benefit?
   - Is there a call-to-action?
   - Can you immediately understand what's being advertised?

4. SAFETY & ETHICS (0-100)
   - Is the content appropriate and brand-safe?
   - Are there any stereotypes or biases?
   - Is it truthful and not misleading?
   - Does it avoid controversial or offensive content?
"#;

const OUTPUT_FORMAT: &str = r#"
OUTPUT FORMAT:
You MUST respond with ONLY a valid JSON object, no other text. Use this exact structure:

{
  "overall_score": <average of all 4 scores>,
  "brand_alignment": {
    "score": <0-100>,
    "feedback": "<2-3 sentences explaining the score>"
  },
  "visual_quality": {
    "score": <0-100>,
    "feedback": "<2-3 sentences explaining the score>"
  },
  "message_clarity": {
    "score": <0-100>,
    "feedback": "<2-3 sentences explaining the score>"
  },
  "safety_ethics": {
    "score": <0-100>,
    "feedback": "<2-3 sentences explaining the score>"
  },
  "strengths": ["<strength 1>", "<strength 2>", "<strength 3>"],
  "issues": ["<issue 1>", "<issue 2>"],
  "suggestions": ["<actionable suggestion 1>", "<actionable suggestion 2>", "<actionable suggestion 3>"]
}

Analyze the image now and return ONLY the JSON response."#;

/// Renders the evaluation prompt for one brand. Only the brand guidelines
/// section depends on the profile; criteria and output format are fixed
/// because reply parsing relies on them.
pub fn build_prompt(profile: &BrandProfile) -> String {
    let header = CRITIQUE_PROMPT_HEADER
        .replace("{brand_name}", &profile.name)
        .replace("{brand_colors}", &profile.colors.join(", "))
        .replace("{brand_tone}", &profile.tone)
        .replace("{brand_logo}", &profile.logo)
        .replace("{brand_tagline}", &profile.tagline);

    let mut prompt = String::with_capacity(
        header.len() + EVALUATION_CRITERIA.len() + OUTPUT_FORMAT.len(),
    );
    prompt.push_str(&header);
    prompt.push_str(EVALUATION_CRITERIA);
    prompt.push_str(OUTPUT_FORMAT);
    prompt
}
